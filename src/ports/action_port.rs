//! Auto-action adapter port trait.

use crate::domain::dispatch::TradeRequest;
use crate::domain::error::IndigraphError;

pub trait ActionAdapter {
    fn name(&self) -> &str;
    fn execute(&self, request: &TradeRequest) -> Result<(), IndigraphError>;
}
