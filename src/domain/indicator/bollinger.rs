//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//! The primary output is the middle band; `upper`, `middle` and `lower`
//! are available as named outputs.
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) values are `NaN`.

use crate::domain::indicator::stddev::mean_and_stddev;
use crate::domain::indicator::{IndicatorOutput, IndicatorTick, Window, first_valid};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT: f64 = 2.0;

fn bands(mean: f64, stddev: f64, mult: f64) -> (f64, f64, f64) {
    (mean + mult * stddev, mean, mean - mult * stddev)
}

pub fn calculate_bollinger(input: &[f64], period: usize, mult: f64) -> IndicatorOutput {
    let len = input.len();
    let mut upper = vec![f64::NAN; len];
    let mut middle = vec![f64::NAN; len];
    let mut lower = vec![f64::NAN; len];

    if period > 0 {
        let start = first_valid(input);
        for i in (start + period - 1)..len {
            let window = &input[i + 1 - period..=i];
            let (mean, stddev) = mean_and_stddev(window.iter(), period);
            (upper[i], middle[i], lower[i]) = bands(mean, stddev, mult);
        }
    }

    let mut output = IndicatorOutput::single(middle.clone());
    output.secondary.insert("upper".into(), upper);
    output.secondary.insert("middle".into(), middle);
    output.secondary.insert("lower".into(), lower);
    output
}

#[derive(Debug, Clone)]
pub struct BollingerState {
    period: usize,
    mult: f64,
    window: Window,
}

impl BollingerState {
    pub fn new(period: usize, mult: f64) -> Self {
        Self {
            period,
            mult,
            window: Window::new(period),
        }
    }

    pub fn update(&mut self, value: f64) -> IndicatorTick {
        let (upper, middle, lower) = if self.period > 0 && self.window.push(value) {
            let (mean, stddev) = mean_and_stddev(self.window.iter(), self.period);
            bands(mean, stddev, self.mult)
        } else {
            (f64::NAN, f64::NAN, f64::NAN)
        };

        let mut tick = IndicatorTick::single(middle);
        tick.secondary.insert("upper".into(), upper);
        tick.secondary.insert("middle".into(), middle);
        tick.secondary.insert("lower".into(), lower);
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_constant_prices_collapse() {
        let out = calculate_bollinger(&[10.0; 4], 3, 2.0);
        assert!(out.primary[1].is_nan());
        assert!((out.secondary["upper"][2] - 10.0).abs() < 1e-12);
        assert!((out.secondary["lower"][3] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn bollinger_band_width() {
        // mean 2, population stddev sqrt(2/3)
        let out = calculate_bollinger(&[1.0, 2.0, 3.0], 3, 2.0);
        let sd = (2.0f64 / 3.0).sqrt();
        assert!((out.primary[2] - 2.0).abs() < 1e-12);
        assert!((out.secondary["upper"][2] - (2.0 + 2.0 * sd)).abs() < 1e-12);
        assert!((out.secondary["lower"][2] - (2.0 - 2.0 * sd)).abs() < 1e-12);
    }

    #[test]
    fn bollinger_state_matches_batch() {
        let input = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0];
        let batch = calculate_bollinger(&input, 3, 1.5);
        let mut state = BollingerState::new(3, 1.5);
        for (i, &x) in input.iter().enumerate() {
            let tick = state.update(x);
            for name in ["upper", "middle", "lower"] {
                let b = batch.clone().into_selected(Some(name))[i];
                let s = tick.select(Some(name));
                assert_eq!(b.is_nan(), s.is_nan());
                if !b.is_nan() {
                    assert_eq!(b, s);
                }
            }
        }
    }
}
