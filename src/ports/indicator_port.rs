//! Indicator application ports.
//!
//! Implementations must be pure: identical inputs give identical outputs
//! and calls have no side effects. The batch evaluator memoizes on that
//! assumption.

use crate::domain::error::GraphError;
use crate::domain::graph::IndicatorSpec;
use crate::domain::indicator::{IndicatorOutput, IndicatorTick};

/// Applies an indicator to a whole input series.
pub trait IndicatorPort {
    fn apply(&self, spec: &IndicatorSpec, input: &[f64]) -> Result<IndicatorOutput, GraphError>;
}

/// Incremental state owned by one indicator node.
pub trait IndicatorState {
    fn update(&mut self, value: f64) -> IndicatorTick;
}

/// Creates fresh incremental state for an indicator node.
pub trait StreamingIndicatorPort {
    fn create(&self, spec: &IndicatorSpec) -> Result<Box<dyn IndicatorState>, GraphError>;
}
