//! Built-in indicator library.
//!
//! Every indicator comes in two forms with identical arithmetic:
//! - a batch function over a full input slice
//! - a streaming state fed one observation at a time
//!
//! Conventions shared by all of them:
//! - output length equals input length
//! - warmup positions are `NaN`
//! - leading `NaN` inputs (an upstream indicator still warming up) are
//!   skipped, so warmup starts at the first real value

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod wma;

use crate::domain::error::GraphError;
use crate::domain::graph::IndicatorSpec;
use std::collections::BTreeMap;

pub use bollinger::{BollingerState, calculate_bollinger};
pub use ema::{EmaState, calculate_ema};
pub use macd::{MacdState, calculate_macd};
pub use roc::{RocState, calculate_roc};
pub use rsi::{RsiState, calculate_rsi};
pub use sma::{SmaState, calculate_sma};
pub use stddev::{StddevState, calculate_stddev};
pub use wma::{WmaState, calculate_wma};

/// Batch result: one primary series plus named secondary series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOutput {
    pub primary: Vec<f64>,
    pub secondary: BTreeMap<String, Vec<f64>>,
}

impl IndicatorOutput {
    pub fn single(primary: Vec<f64>) -> Self {
        Self {
            primary,
            secondary: BTreeMap::new(),
        }
    }

    /// Takes the series for `output`, falling back to the primary series
    /// when no output is requested or the requested one does not exist.
    pub fn into_selected(mut self, output: Option<&str>) -> Vec<f64> {
        match output.and_then(|name| self.secondary.remove(name)) {
            Some(values) => values,
            None => {
                if let Some(name) = output {
                    log::debug!("output {name} not produced, using primary output");
                }
                self.primary
            }
        }
    }
}

/// Streaming result for one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTick {
    pub primary: f64,
    pub secondary: BTreeMap<String, f64>,
}

impl IndicatorTick {
    pub fn single(primary: f64) -> Self {
        Self {
            primary,
            secondary: BTreeMap::new(),
        }
    }

    pub fn select(&self, output: Option<&str>) -> f64 {
        output
            .and_then(|name| self.secondary.get(name).copied())
            .unwrap_or(self.primary)
    }
}

/// Parsed identity and parameters of a built-in indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorKind {
    Sma(usize),
    Ema(usize),
    Wma(usize),
    Roc(usize),
    Stddev(usize),
    Rsi(usize),
    Bollinger { period: usize, mult: f64 },
    Macd { fast: usize, slow: usize, signal: usize },
}

/// Largest accepted window or period length.
pub const MAX_PERIOD: usize = 1_000_000;

fn period_param(
    spec: &IndicatorSpec,
    index: usize,
    default: Option<usize>,
) -> Result<usize, GraphError> {
    let invalid = |reason: String| GraphError::InvalidParameters {
        indicator: spec.to_string(),
        reason,
    };
    match spec.params.get(index) {
        Some(&p) if p >= 1.0 && p <= MAX_PERIOD as f64 && p.fract() == 0.0 => Ok(p as usize),
        Some(&p) => Err(invalid(format!(
            "parameter {} must be an integer between 1 and {}, got {}",
            index + 1,
            MAX_PERIOD,
            p
        ))),
        None => default.ok_or_else(|| invalid(format!("missing parameter {}", index + 1))),
    }
}

impl IndicatorKind {
    pub fn from_spec(spec: &IndicatorSpec) -> Result<Self, GraphError> {
        let kind = match spec.name.as_str() {
            "SMA" => IndicatorKind::Sma(period_param(spec, 0, None)?),
            "EMA" => IndicatorKind::Ema(period_param(spec, 0, None)?),
            "WMA" => IndicatorKind::Wma(period_param(spec, 0, None)?),
            "ROC" => IndicatorKind::Roc(period_param(spec, 0, None)?),
            "STDDEV" => IndicatorKind::Stddev(period_param(spec, 0, None)?),
            "RSI" => IndicatorKind::Rsi(period_param(spec, 0, Some(14))?),
            "BOLLINGER" => {
                let period = period_param(spec, 0, Some(bollinger::DEFAULT_PERIOD))?;
                let mult = spec
                    .params
                    .get(1)
                    .copied()
                    .unwrap_or(bollinger::DEFAULT_MULT);
                IndicatorKind::Bollinger { period, mult }
            }
            "MACD" => {
                let fast = period_param(spec, 0, Some(macd::DEFAULT_FAST))?;
                let slow = period_param(spec, 1, Some(macd::DEFAULT_SLOW))?;
                let signal = period_param(spec, 2, Some(macd::DEFAULT_SIGNAL))?;
                IndicatorKind::Macd { fast, slow, signal }
            }
            _ => {
                return Err(GraphError::UnsupportedIndicator {
                    name: spec.name.clone(),
                });
            }
        };
        Ok(kind)
    }

    pub fn apply(&self, input: &[f64]) -> IndicatorOutput {
        match *self {
            IndicatorKind::Sma(n) => IndicatorOutput::single(calculate_sma(input, n)),
            IndicatorKind::Ema(n) => IndicatorOutput::single(calculate_ema(input, n)),
            IndicatorKind::Wma(n) => IndicatorOutput::single(calculate_wma(input, n)),
            IndicatorKind::Roc(n) => IndicatorOutput::single(calculate_roc(input, n)),
            IndicatorKind::Stddev(n) => IndicatorOutput::single(calculate_stddev(input, n)),
            IndicatorKind::Rsi(n) => IndicatorOutput::single(calculate_rsi(input, n)),
            IndicatorKind::Bollinger { period, mult } => calculate_bollinger(input, period, mult),
            IndicatorKind::Macd { fast, slow, signal } => {
                calculate_macd(input, fast, slow, signal)
            }
        }
    }

    pub fn streaming(&self) -> StreamingIndicator {
        match *self {
            IndicatorKind::Sma(n) => StreamingIndicator::Sma(SmaState::new(n)),
            IndicatorKind::Ema(n) => StreamingIndicator::Ema(EmaState::new(n)),
            IndicatorKind::Wma(n) => StreamingIndicator::Wma(WmaState::new(n)),
            IndicatorKind::Roc(n) => StreamingIndicator::Roc(RocState::new(n)),
            IndicatorKind::Stddev(n) => StreamingIndicator::Stddev(StddevState::new(n)),
            IndicatorKind::Rsi(n) => StreamingIndicator::Rsi(RsiState::new(n)),
            IndicatorKind::Bollinger { period, mult } => {
                StreamingIndicator::Bollinger(BollingerState::new(period, mult))
            }
            IndicatorKind::Macd { fast, slow, signal } => {
                StreamingIndicator::Macd(MacdState::new(fast, slow, signal))
            }
        }
    }
}

/// Incremental state of one built-in indicator.
#[derive(Debug, Clone)]
pub enum StreamingIndicator {
    Sma(SmaState),
    Ema(EmaState),
    Wma(WmaState),
    Roc(RocState),
    Stddev(StddevState),
    Rsi(RsiState),
    Bollinger(BollingerState),
    Macd(MacdState),
}

impl StreamingIndicator {
    pub fn update(&mut self, value: f64) -> IndicatorTick {
        match self {
            StreamingIndicator::Sma(s) => IndicatorTick::single(s.update(value)),
            StreamingIndicator::Ema(s) => IndicatorTick::single(s.update(value)),
            StreamingIndicator::Wma(s) => IndicatorTick::single(s.update(value)),
            StreamingIndicator::Roc(s) => IndicatorTick::single(s.update(value)),
            StreamingIndicator::Stddev(s) => IndicatorTick::single(s.update(value)),
            StreamingIndicator::Rsi(s) => IndicatorTick::single(s.update(value)),
            StreamingIndicator::Bollinger(s) => s.update(value),
            StreamingIndicator::Macd(s) => s.update(value),
        }
    }
}

/// Index of the first non-`NaN` input, or `input.len()` if there is none.
pub(crate) fn first_valid(input: &[f64]) -> usize {
    input
        .iter()
        .position(|x| !x.is_nan())
        .unwrap_or(input.len())
}

/// Sliding window used by the streaming forms of window-based indicators.
///
/// Ignores leading `NaN` values so it lines up with [`first_valid`].
#[derive(Debug, Clone)]
pub(crate) struct Window {
    capacity: usize,
    values: std::collections::VecDeque<f64>,
    started: bool,
}

impl Window {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: std::collections::VecDeque::new(),
            started: false,
        }
    }

    /// Pushes `value`; returns `true` once the window is full.
    pub(crate) fn push(&mut self, value: f64) -> bool {
        if !self.started && value.is_nan() {
            return false;
        }
        self.started = true;
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.values.len() == self.capacity
    }

    pub(crate) fn iter(&self) -> std::collections::vec_deque::Iter<'_, f64> {
        self.values.iter()
    }

    pub(crate) fn front(&self) -> f64 {
        self.values.front().copied().unwrap_or(f64::NAN)
    }

    pub(crate) fn back(&self) -> f64 {
        self.values.back().copied().unwrap_or(f64::NAN)
    }
}
