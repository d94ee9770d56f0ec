//! ROC (Rate of Change) indicator.
//!
//! ROC(n)[i] = ((P[i] - P[i-n]) / P[i-n]) * 100
//! If P[i-n] == 0: ROC = 0
//! Warmup: first n values are `NaN`.

use crate::domain::indicator::{Window, first_valid};

fn rate_of_change(prev: f64, curr: f64) -> f64 {
    if prev == 0.0 {
        0.0
    } else {
        ((curr - prev) / prev) * 100.0
    }
}

pub fn calculate_roc(input: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; input.len()];
    let start = first_valid(input);

    for i in (start + period)..input.len() {
        values[i] = rate_of_change(input[i - period], input[i]);
    }
    values
}

#[derive(Debug, Clone)]
pub struct RocState {
    window: Window,
}

impl RocState {
    pub fn new(period: usize) -> Self {
        Self {
            window: Window::new(period + 1),
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        if !self.window.push(value) {
            return f64::NAN;
        }
        rate_of_change(self.window.front(), self.window.back())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roc_basic() {
        let values = calculate_roc(&[100.0, 105.0, 110.0], 2);
        assert!(values[0].is_nan());
        assert!(values[1].is_nan());
        assert!((values[2] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn roc_zero_base_is_zero() {
        let values = calculate_roc(&[0.0, 5.0], 1);
        assert_eq!(values[1], 0.0);
    }

    #[test]
    fn roc_negative() {
        let values = calculate_roc(&[100.0, 90.0], 1);
        assert!((values[1] + 10.0).abs() < 1e-12);
    }

    #[test]
    fn roc_state_matches_batch() {
        let input = [f64::NAN, 50.0, 55.0, 45.0, 60.0];
        let batch = calculate_roc(&input, 2);
        let mut state = RocState::new(2);
        for (i, &x) in input.iter().enumerate() {
            let v = state.update(x);
            assert_eq!(v.is_nan(), batch[i].is_nan());
            if !v.is_nan() {
                assert_eq!(v, batch[i]);
            }
        }
    }
}
