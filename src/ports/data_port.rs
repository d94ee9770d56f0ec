//! Base series supply port trait.

use crate::domain::error::IndigraphError;
use crate::domain::graph::SeriesKey;
use chrono::{DateTime, Utc};

/// One time-stamped scalar of a base series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

pub trait SeriesPort {
    /// Full history for `key`, oldest first.
    fn fetch_series(&self, key: &SeriesKey) -> Result<Vec<Observation>, IndigraphError>;
}
