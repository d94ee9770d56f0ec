//! Standard Deviation indicator.
//!
//! Population standard deviation over n values.
//! STDDEV(n)[i] = sqrt(sum((P[i-j] - SMA(n)[i])^2 for j in 0..n-1) / n)
//! Warmup: first (n-1) values are `NaN`.

use crate::domain::indicator::{Window, first_valid};

/// Mean and population standard deviation of `window`.
pub(crate) fn mean_and_stddev<'a>(window: impl Iterator<Item = &'a f64> + Clone, n: usize) -> (f64, f64) {
    let mean: f64 = window.clone().sum::<f64>() / n as f64;
    let variance: f64 = window
        .map(|x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / n as f64;
    (mean, variance.sqrt())
}

pub fn calculate_stddev(input: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; input.len()];
    if period == 0 {
        return values;
    }

    let start = first_valid(input);
    for i in (start + period - 1)..input.len() {
        let window = &input[i + 1 - period..=i];
        values[i] = mean_and_stddev(window.iter(), period).1;
    }
    values
}

#[derive(Debug, Clone)]
pub struct StddevState {
    period: usize,
    window: Window,
}

impl StddevState {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: Window::new(period),
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        if self.period == 0 || !self.window.push(value) {
            return f64::NAN;
        }
        mean_and_stddev(self.window.iter(), self.period).1
    }
}
