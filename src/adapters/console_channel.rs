//! Console notification channel: one line per fired signal.

use crate::domain::dispatch::NotificationEvent;
use crate::domain::error::IndigraphError;
use crate::ports::notification_port::NotificationChannel;
use std::cell::RefCell;
use std::io::Write;

pub struct ConsoleChannel {
    out: RefCell<Box<dyn Write>>,
}

impl ConsoleChannel {
    /// Writes to stdout.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }
}

pub fn format_event(event: &NotificationEvent) -> String {
    format!(
        "{} [{}] {} value={}",
        event.timestamp.to_rfc3339(),
        event.signal_id,
        event.name,
        event.value
    )
}

impl NotificationChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    fn notify(&self, event: &NotificationEvent) -> Result<(), IndigraphError> {
        let line = format_event(event);
        log::info!("{}", line);
        let mut out = self.out.borrow_mut();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}
