//! Notification channel port trait.

use crate::domain::dispatch::NotificationEvent;
use crate::domain::error::IndigraphError;

/// Receives every fired signal, in firing order.
///
/// Delivery is best-effort: a failing channel is logged and does not stop
/// the remaining channels.
pub trait NotificationChannel {
    fn name(&self) -> &str;
    fn notify(&self, event: &NotificationEvent) -> Result<(), IndigraphError>;
}
