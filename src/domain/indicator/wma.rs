//! Weighted Moving Average indicator.
//!
//! O(n) sliding window using running weighted and plain sums.
//! WMA(n) = (1*P[i-n+1] + 2*P[i-n+2] + ... + n*P[i]) / (n*(n+1)/2)
//! Warmup: first (n-1) values are `NaN`.

use crate::domain::indicator::first_valid;
use std::collections::VecDeque;

pub fn calculate_wma(input: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; input.len()];
    if period == 0 {
        return values;
    }

    let divisor = (period * (period + 1)) as f64 / 2.0;
    let mut weighted_sum: f64 = 0.0;
    let mut window_sum: f64 = 0.0;
    let start = first_valid(input);

    for i in start..input.len() {
        let seen = i - start;
        let x = input[i];
        if seen < period {
            let weight = (seen + 1) as f64;
            weighted_sum += weight * x;
            window_sum += x;
        } else {
            weighted_sum += period as f64 * x - window_sum;
            window_sum += x - input[i - period];
        }

        if seen + 1 >= period {
            values[i] = weighted_sum / divisor;
        }
    }
    values
}

#[derive(Debug, Clone)]
pub struct WmaState {
    period: usize,
    divisor: f64,
    weighted_sum: f64,
    window_sum: f64,
    window: VecDeque<f64>,
    seen: usize,
}

impl WmaState {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            divisor: (period * (period + 1)) as f64 / 2.0,
            weighted_sum: 0.0,
            window_sum: 0.0,
            window: VecDeque::new(),
            seen: 0,
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        if self.period == 0 || (self.seen == 0 && value.is_nan()) {
            return f64::NAN;
        }
        if self.seen < self.period {
            let weight = (self.seen + 1) as f64;
            self.weighted_sum += weight * value;
            self.window_sum += value;
        } else {
            let oldest = self.window.pop_front().unwrap_or(f64::NAN);
            self.weighted_sum += self.period as f64 * value - self.window_sum;
            self.window_sum += value - oldest;
        }
        self.window.push_back(value);
        self.seen += 1;

        if self.seen >= self.period {
            self.weighted_sum / self.divisor
        } else {
            f64::NAN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wma_basic() {
        let values = calculate_wma(&[1.0, 2.0, 3.0], 3);
        // (1*1 + 2*2 + 3*3) / 6
        assert!(values[0].is_nan());
        assert!(values[1].is_nan());
        assert!((values[2] - 14.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn wma_sliding() {
        let values = calculate_wma(&[1.0, 2.0, 3.0, 4.0], 3);
        // (1*2 + 2*3 + 3*4) / 6
        assert!((values[3] - 20.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn wma_equal_prices() {
        let values = calculate_wma(&[50.0; 6], 4);
        for v in &values[3..] {
            assert!((v - 50.0).abs() < 1e-12);
        }
    }

    #[test]
    fn wma_state_matches_batch() {
        let input = [f64::NAN, 4.0, 8.0, 6.0, 2.0, 9.0, 1.0];
        let batch = calculate_wma(&input, 3);
        let mut state = WmaState::new(3);
        for (i, &x) in input.iter().enumerate() {
            let v = state.update(x);
            assert_eq!(v.is_nan(), batch[i].is_nan());
            if !v.is_nan() {
                assert_eq!(v, batch[i]);
            }
        }
    }
}
