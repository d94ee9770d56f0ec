#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use indigraph::adapters::builtin_indicators::BuiltinIndicators;
use indigraph::domain::builder::GraphBuilder;
use indigraph::domain::dispatch::{NotificationEvent, TradeRequest};
use indigraph::domain::error::{GraphError, IndigraphError};
use indigraph::domain::graph::{BinaryOp, Graph, Handle, IndicatorSpec, NamedKey, SeriesKey};
use indigraph::domain::indicator::IndicatorOutput;
use indigraph::ports::action_port::ActionAdapter;
use indigraph::ports::data_port::{Observation, SeriesPort};
use indigraph::ports::indicator_port::IndicatorPort;
use indigraph::ports::notification_port::NotificationChannel;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Indicator port that counts calls and delegates to the built-ins.
#[derive(Default)]
pub struct CountingIndicatorPort {
    pub calls: Cell<usize>,
}

impl CountingIndicatorPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl IndicatorPort for CountingIndicatorPort {
    fn apply(&self, spec: &IndicatorSpec, input: &[f64]) -> Result<IndicatorOutput, GraphError> {
        self.calls.set(self.calls.get() + 1);
        BuiltinIndicators.apply(spec, input)
    }
}

pub struct MockSeriesPort {
    pub data: HashMap<SeriesKey, Vec<Observation>>,
}

impl MockSeriesPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_series(mut self, key: SeriesKey, values: &[f64]) -> Self {
        let observations = values
            .iter()
            .enumerate()
            .map(|(i, &value)| Observation {
                timestamp: day(i as i64),
                value,
            })
            .collect();
        self.data.insert(key, observations);
        self
    }
}

impl SeriesPort for MockSeriesPort {
    fn fetch_series(&self, key: &SeriesKey) -> Result<Vec<Observation>, IndigraphError> {
        self.data.get(key).cloned().ok_or_else(|| IndigraphError::Data {
            reason: format!("no data for {}", key),
        })
    }
}

pub type EventLog = Rc<RefCell<Vec<NotificationEvent>>>;

pub struct RecordingChannel {
    pub events: EventLog,
}

impl RecordingChannel {
    pub fn new() -> (Self, EventLog) {
        let events: EventLog = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: Rc::clone(&events),
            },
            events,
        )
    }
}

impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify(&self, event: &NotificationEvent) -> Result<(), IndigraphError> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}

pub struct FailingChannel;

impl NotificationChannel for FailingChannel {
    fn name(&self) -> &str {
        "failing"
    }

    fn notify(&self, _event: &NotificationEvent) -> Result<(), IndigraphError> {
        Err(IndigraphError::Data {
            reason: "channel offline".into(),
        })
    }
}

#[derive(Default)]
pub struct RecordingAdapter {
    pub requests: RefCell<Vec<TradeRequest>>,
}

impl ActionAdapter for RecordingAdapter {
    fn name(&self) -> &str {
        "recording"
    }

    fn execute(&self, request: &TradeRequest) -> Result<(), IndigraphError> {
        self.requests.borrow_mut().push(request.clone());
        Ok(())
    }
}

pub fn bhp() -> SeriesKey {
    SeriesKey::new("BHP", "1d")
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::TimeDelta::days(n)
}

/// close -> a = SMA(2) -> b = SMA(2) of a; diff = a - b.
pub struct ChainGraph {
    pub graph: Graph,
    pub close: Handle,
    pub a: Handle,
    pub b: Handle,
    pub diff: Handle,
}

pub fn chain_graph() -> ChainGraph {
    let mut builder = GraphBuilder::new();
    let close = builder.allocate_base(bhp());
    let a = builder
        .allocate_indicator(close, IndicatorSpec::new("SMA", vec![2.0]))
        .unwrap();
    let b = builder
        .allocate_indicator(a, IndicatorSpec::new("SMA", vec![2.0]))
        .unwrap();
    let diff = builder.allocate_formula(a, b, BinaryOp::Sub).unwrap();
    builder.bind_name(NamedKey::new("close"), close).unwrap();
    builder.bind_name(NamedKey::new("a"), a).unwrap();
    builder.bind_name(NamedKey::new("b"), b).unwrap();
    builder.bind_name(NamedKey::new("diff"), diff).unwrap();
    ChainGraph {
        graph: builder.build().unwrap(),
        close,
        a,
        b,
        diff,
    }
}
