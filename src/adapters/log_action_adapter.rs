//! Action adapter that records trade requests instead of executing them.

use crate::domain::dispatch::TradeRequest;
use crate::domain::error::IndigraphError;
use crate::ports::action_port::ActionAdapter;
use std::sync::Mutex;

#[derive(Default)]
pub struct LogActionAdapter {
    requests: Mutex<Vec<TradeRequest>>,
}

impl LogActionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<TradeRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ActionAdapter for LogActionAdapter {
    fn name(&self) -> &str {
        "log"
    }

    fn execute(&self, request: &TradeRequest) -> Result<(), IndigraphError> {
        log::info!(
            "trade request {} for signal {} at {}",
            request.action,
            request.signal_id,
            request.timestamp.to_rfc3339()
        );
        let mut guard = self.requests.lock().map_err(|_| IndigraphError::Data {
            reason: "trade request log is poisoned".into(),
        })?;
        guard.push(request.clone());
        Ok(())
    }
}
