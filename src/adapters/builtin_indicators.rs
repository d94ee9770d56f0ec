//! Built-in indicator library exposed through the indicator ports.

use crate::domain::error::GraphError;
use crate::domain::graph::IndicatorSpec;
use crate::domain::indicator::{IndicatorKind, IndicatorOutput, IndicatorTick, StreamingIndicator};
use crate::ports::indicator_port::{IndicatorPort, IndicatorState, StreamingIndicatorPort};

/// SMA, EMA, WMA, ROC, STDDEV, RSI, BOLLINGER and MACD in batch and
/// streaming form.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinIndicators;

impl IndicatorPort for BuiltinIndicators {
    fn apply(&self, spec: &IndicatorSpec, input: &[f64]) -> Result<IndicatorOutput, GraphError> {
        Ok(IndicatorKind::from_spec(spec)?.apply(input))
    }
}

impl IndicatorState for StreamingIndicator {
    fn update(&mut self, value: f64) -> IndicatorTick {
        StreamingIndicator::update(self, value)
    }
}

impl StreamingIndicatorPort for BuiltinIndicators {
    fn create(&self, spec: &IndicatorSpec) -> Result<Box<dyn IndicatorState>, GraphError> {
        Ok(Box::new(IndicatorKind::from_spec(spec)?.streaming()))
    }
}
