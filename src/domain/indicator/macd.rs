//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Primary output is the MACD line; `line`, `signal` and `histogram` are
//! named outputs.
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 values for the line, plus signal - 1 for
//! the signal line and histogram.

use crate::domain::indicator::{EmaState, IndicatorOutput, IndicatorTick};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone)]
pub struct MacdState {
    fast: EmaState,
    slow: EmaState,
    signal: EmaState,
}

impl MacdState {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: EmaState::new(fast),
            slow: EmaState::new(slow),
            signal: EmaState::new(signal),
        }
    }

    pub fn update(&mut self, value: f64) -> IndicatorTick {
        let fast = self.fast.update(value);
        let slow = self.slow.update(value);
        let line = fast - slow;
        // the signal EMA skips the NaN line values of the warmup
        let signal = self.signal.update(line);
        let histogram = line - signal;

        let mut tick = IndicatorTick::single(line);
        tick.secondary.insert("line".into(), line);
        tick.secondary.insert("signal".into(), signal);
        tick.secondary.insert("histogram".into(), histogram);
        tick
    }
}

pub fn calculate_macd(input: &[f64], fast: usize, slow: usize, signal: usize) -> IndicatorOutput {
    let mut state = MacdState::new(fast, slow, signal);
    let mut line = Vec::with_capacity(input.len());
    let mut signal_line = Vec::with_capacity(input.len());
    let mut histogram = Vec::with_capacity(input.len());

    for &x in input {
        let tick = state.update(x);
        line.push(tick.primary);
        signal_line.push(tick.select(Some("signal")));
        histogram.push(tick.select(Some("histogram")));
    }

    let mut output = IndicatorOutput::single(line.clone());
    output.secondary.insert("line".into(), line);
    output.secondary.insert("signal".into(), signal_line);
    output.secondary.insert("histogram".into(), histogram);
    output
}
