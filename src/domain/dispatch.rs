//! Dispatcher: routes fired signals to notification channels and to the
//! auto-action rules bound to their identity.

use crate::domain::signal::SignalId;
use crate::ports::action_port::ActionAdapter;
use crate::ports::notification_port::NotificationChannel;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub signal_id: SignalId,
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    MarketBuy,
    MarketSell,
    ClosePosition,
}

impl TradeAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "market_buy" | "buy" => Some(TradeAction::MarketBuy),
            "market_sell" | "sell" => Some(TradeAction::MarketSell),
            "close_position" | "close" => Some(TradeAction::ClosePosition),
            _ => None,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeAction::MarketBuy => "market_buy",
            TradeAction::MarketSell => "market_sell",
            TradeAction::ClosePosition => "close_position",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    pub signal_id: SignalId,
    pub action: TradeAction,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AutoActionRule {
    pub signal_id: SignalId,
    pub action: TradeAction,
    pub adapter: Arc<dyn ActionAdapter>,
}

impl fmt::Debug for AutoActionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoActionRule")
            .field("signal_id", &self.signal_id)
            .field("action", &self.action)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

#[derive(Default)]
pub struct Dispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
    rules: Vec<AutoActionRule>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: Box<dyn NotificationChannel>) {
        self.channels.push(channel);
    }

    pub fn add_rule(&mut self, rule: AutoActionRule) {
        self.rules.push(rule);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn rules(&self) -> &[AutoActionRule] {
        &self.rules
    }

    /// Notifies every channel in registration order, then runs each
    /// auto-action rule bound to `signal_id`.
    ///
    /// Delivery is best-effort: a failing channel or adapter is logged and
    /// the rest still run.
    pub fn dispatch(&self, signal_id: &SignalId, name: &str, value: f64, now: DateTime<Utc>) {
        let event = NotificationEvent {
            signal_id: signal_id.clone(),
            name: name.to_string(),
            value,
            timestamp: now,
        };
        for channel in &self.channels {
            if let Err(e) = channel.notify(&event) {
                log::warn!("notification channel {} failed: {}", channel.name(), e);
            }
        }

        for rule in self.rules.iter().filter(|r| &r.signal_id == signal_id) {
            let request = TradeRequest {
                signal_id: signal_id.clone(),
                action: rule.action,
                timestamp: now,
            };
            if let Err(e) = rule.adapter.execute(&request) {
                log::warn!("action adapter {} failed: {}", rule.adapter.name(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::IndigraphError;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Channel {
        name: String,
        log: Log,
        fail: bool,
    }

    impl NotificationChannel for Channel {
        fn name(&self) -> &str {
            &self.name
        }

        fn notify(&self, event: &NotificationEvent) -> Result<(), IndigraphError> {
            self.log
                .borrow_mut()
                .push(format!("{}:{}", self.name, event.signal_id));
            if self.fail {
                return Err(IndigraphError::Data {
                    reason: "unreachable".into(),
                });
            }
            Ok(())
        }
    }

    struct Adapter {
        requests: RefCell<Vec<TradeRequest>>,
    }

    impl ActionAdapter for Adapter {
        fn name(&self) -> &str {
            "recording"
        }

        fn execute(&self, request: &TradeRequest) -> Result<(), IndigraphError> {
            self.requests.borrow_mut().push(request.clone());
            Ok(())
        }
    }

    fn channel(name: &str, log: &Log, fail: bool) -> Box<dyn NotificationChannel> {
        Box::new(Channel {
            name: name.into(),
            log: Rc::clone(log),
            fail,
        })
    }

    #[test]
    fn channels_run_in_order_and_failures_do_not_stop_others() {
        let log: Log = Rc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.add_channel(channel("first", &log, true));
        dispatcher.add_channel(channel("second", &log, false));

        dispatcher.dispatch(&SignalId::new("s1"), "sig", 1.0, Utc::now());
        assert_eq!(*log.borrow(), vec!["first:s1", "second:s1"]);
    }

    #[test]
    fn only_matching_rules_execute() {
        let adapter = Arc::new(Adapter {
            requests: RefCell::new(Vec::new()),
        });
        let mut dispatcher = Dispatcher::new();
        dispatcher.add_rule(AutoActionRule {
            signal_id: SignalId::new("buy"),
            action: TradeAction::MarketBuy,
            adapter: adapter.clone(),
        });
        dispatcher.add_rule(AutoActionRule {
            signal_id: SignalId::new("sell"),
            action: TradeAction::MarketSell,
            adapter: adapter.clone(),
        });

        let now = Utc::now();
        dispatcher.dispatch(&SignalId::new("buy"), "Buy", 72.0, now);

        let requests = adapter.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0],
            TradeRequest {
                signal_id: SignalId::new("buy"),
                action: TradeAction::MarketBuy,
                timestamp: now,
            }
        );
    }

    #[test]
    fn trade_action_parse() {
        assert_eq!(TradeAction::parse("market_buy"), Some(TradeAction::MarketBuy));
        assert_eq!(TradeAction::parse("CLOSE_POSITION"), Some(TradeAction::ClosePosition));
        assert_eq!(TradeAction::parse("hold"), None);
        assert_eq!(TradeAction::MarketSell.to_string(), "market_sell");
    }
}
