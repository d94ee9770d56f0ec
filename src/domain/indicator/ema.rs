//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = P[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are `NaN`.

#[derive(Debug, Clone)]
pub struct EmaState {
    period: usize,
    k: f64,
    count: usize,
    sum: f64,
    ema: f64,
}

impl EmaState {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            count: 0,
            sum: 0.0,
            ema: f64::NAN,
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        if self.period == 0 || (self.count == 0 && value.is_nan()) {
            return f64::NAN;
        }
        self.count += 1;
        if self.count < self.period {
            self.sum += value;
            f64::NAN
        } else if self.count == self.period {
            self.sum += value;
            self.ema = self.sum / self.period as f64;
            self.ema
        } else {
            self.ema = value * self.k + self.ema * (1.0 - self.k);
            self.ema
        }
    }
}

pub fn calculate_ema(input: &[f64], period: usize) -> Vec<f64> {
    let mut state = EmaState::new(period);
    input.iter().map(|&x| state.update(x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_warmup() {
        let values = calculate_ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);
        assert!(values[0].is_nan());
        assert!(values[1].is_nan());
        assert!(values[2..].iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn ema_period_1() {
        let values = calculate_ema(&[10.0, 20.0, 30.0], 1);
        assert!((values[0] - 10.0).abs() < f64::EPSILON);
        assert!((values[1] - 20.0).abs() < f64::EPSILON);
        assert!((values[2] - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_seed_is_sma() {
        let values = calculate_ema(&[10.0, 20.0, 30.0], 3);
        let expected_sma = (10.0 + 20.0 + 30.0) / 3.0;
        assert!((values[2] - expected_sma).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_recursive_calculation() {
        let values = calculate_ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        let k = 2.0 / 4.0;
        let sma = (10.0 + 20.0 + 30.0) / 3.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert!((values[3] - ema_3).abs() < f64::EPSILON);
        assert!((values[4] - ema_4).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_skips_leading_nan() {
        let values = calculate_ema(&[f64::NAN, f64::NAN, 4.0, 6.0], 2);
        assert!(values[2].is_nan());
        assert!((values[3] - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_period_0() {
        let values = calculate_ema(&[10.0, 20.0], 0);
        assert!(values.iter().all(|v| v.is_nan()));
    }
}
