//! CSV file series adapter.
//!
//! Reads `<dir>/<symbol>_<timeframe>.csv`. The first column is the
//! timestamp (`YYYY-MM-DD` or RFC 3339); the value comes from a column
//! named `close` or `value`, else the second column.

use crate::domain::error::IndigraphError;
use crate::domain::graph::SeriesKey;
use crate::ports::data_port::{Observation, SeriesPort};
use chrono::{DateTime, NaiveDate, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, key: &SeriesKey) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", key.symbol, key.timeframe))
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl SeriesPort for CsvAdapter {
    fn fetch_series(&self, key: &SeriesKey) -> Result<Vec<Observation>, IndigraphError> {
        let path = self.csv_path(key);
        let content = fs::read_to_string(&path).map_err(|e| IndigraphError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| IndigraphError::Data {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let value_col = headers
            .iter()
            .position(|h| {
                let h = h.trim().to_lowercase();
                h == "close" || h == "value"
            })
            .unwrap_or(1);

        let mut observations = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| IndigraphError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| IndigraphError::Data {
                reason: "missing date column".into(),
            })?;
            let timestamp = parse_timestamp(date_str).ok_or_else(|| IndigraphError::Data {
                reason: format!("invalid timestamp '{}' on row {}", date_str, line + 1),
            })?;

            let value: f64 = record
                .get(value_col)
                .ok_or_else(|| IndigraphError::Data {
                    reason: format!("missing value column on row {}", line + 1),
                })?
                .trim()
                .parse()
                .map_err(|e| IndigraphError::Data {
                    reason: format!("invalid value on row {}: {}", line + 1, e),
                })?;

            observations.push(Observation { timestamp, value });
        }

        observations.sort_by_key(|o| o.timestamp);
        log::debug!("read {} observation(s) for {}", observations.len(), key);
        Ok(observations)
    }
}
