//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n values are `NaN` (need n changes to compute initial average).

#[derive(Debug, Clone)]
pub struct RsiState {
    period: usize,
    prev: Option<f64>,
    changes: usize,
    avg_gain: f64,
    avg_loss: f64,
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

impl RsiState {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            changes: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        let prev = match self.prev {
            None => {
                if !value.is_nan() {
                    self.prev = Some(value);
                }
                return f64::NAN;
            }
            Some(p) => p,
        };
        self.prev = Some(value);
        if self.period == 0 {
            return f64::NAN;
        }

        let change = value - prev;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        self.changes += 1;

        let n = self.period as f64;
        if self.changes <= self.period {
            // running sums until the seed average
            self.avg_gain += gain;
            self.avg_loss += loss;
            if self.changes < self.period {
                return f64::NAN;
            }
            self.avg_gain /= n;
            self.avg_loss /= n;
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }
        rsi_value(self.avg_gain, self.avg_loss)
    }
}

pub fn calculate_rsi(input: &[f64], period: usize) -> Vec<f64> {
    let mut state = RsiState::new(period);
    input.iter().map(|&x| state.update(x)).collect()
}
