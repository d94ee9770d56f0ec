//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = (P[i-n+1] + ... + P[i]) / n
//! Warmup: first (n-1) values are `NaN`.

use crate::domain::indicator::{Window, first_valid};

pub fn calculate_sma(input: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; input.len()];
    if period == 0 {
        return values;
    }

    let start = first_valid(input);
    for i in (start + period - 1)..input.len() {
        let window = &input[i + 1 - period..=i];
        values[i] = window.iter().sum::<f64>() / period as f64;
    }
    values
}

#[derive(Debug, Clone)]
pub struct SmaState {
    period: usize,
    window: Window,
}

impl SmaState {
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
        self.window.iter().sum::<f64>() / self.period as f64
    }
}
