//! Signal engine: edge-triggered threshold and crossing detection.
//!
//! # Trigger Semantics
//!
//! - `Above` / `Below`: level triggers, `value >= threshold` / `value <= threshold`.
//!   Fire only on the inactive to active transition; re-arm once the level
//!   stops holding.
//! - `CrossesAbove` / `CrossesBelow`: compare the previous observed value with
//!   the current one. The first sample of a rule never fires.
//! - A missing or `NaN` value skips the rule without touching its state.

use crate::domain::error::GraphError;
use crate::domain::snapshot::{SeriesRef, SnapshotView};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Above,
    Below,
    CrossesAbove,
    CrossesBelow,
}

impl TriggerKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "above" => Some(TriggerKind::Above),
            "below" => Some(TriggerKind::Below),
            "crosses_above" => Some(TriggerKind::CrossesAbove),
            "crosses_below" => Some(TriggerKind::CrossesBelow),
            _ => None,
        }
    }

    pub fn is_level(self) -> bool {
        matches!(self, TriggerKind::Above | TriggerKind::Below)
    }

    /// Whether a level trigger holds for `value`. Always false for crosses.
    pub fn level_holds(self, value: f64, threshold: f64) -> bool {
        match self {
            TriggerKind::Above => value >= threshold,
            TriggerKind::Below => value <= threshold,
            TriggerKind::CrossesAbove | TriggerKind::CrossesBelow => false,
        }
    }

    /// Whether the move from `previous` to `current` crosses `threshold`.
    /// Always false for level triggers.
    pub fn crossed(self, previous: f64, current: f64, threshold: f64) -> bool {
        match self {
            TriggerKind::CrossesAbove => previous < threshold && current >= threshold,
            TriggerKind::CrossesBelow => previous > threshold && current <= threshold,
            TriggerKind::Above | TriggerKind::Below => false,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerKind::Above => "above",
            TriggerKind::Below => "below",
            TriggerKind::CrossesAbove => "crosses_above",
            TriggerKind::CrossesBelow => "crosses_below",
        };
        f.write_str(s)
    }
}

/// Stable identity of a signal or group signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(String);

impl SignalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SignalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRule {
    pub id: SignalId,
    pub name: String,
    pub series: SeriesRef,
    pub trigger: TriggerKind,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalState {
    pub previous: Option<f64>,
    pub is_active: bool,
}

impl SignalState {
    /// Applies one valid observation; returns the next state and whether it fired.
    pub fn step(self, trigger: TriggerKind, threshold: f64, value: f64) -> (SignalState, bool) {
        let fired;
        let mut next = self;
        if trigger.is_level() {
            let active = trigger.level_holds(value, threshold);
            fired = active && !self.is_active;
            next.is_active = active;
        } else {
            fired = self
                .previous
                .is_some_and(|prev| trigger.crossed(prev, value, threshold));
        }
        next.previous = Some(value);
        (next, fired)
    }
}

/// One firing produced by a signal or group engine pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredSignal {
    pub id: SignalId,
    pub name: String,
    pub value: f64,
}

struct Entry {
    rule: SignalRule,
    state: SignalState,
}

#[derive(Default)]
pub struct SignalEngine {
    entries: Vec<Entry>,
}

impl SignalEngine {
    pub fn new(rules: Vec<SignalRule>) -> Self {
        Self {
            entries: rules
                .into_iter()
                .map(|rule| Entry {
                    rule,
                    state: SignalState::default(),
                })
                .collect(),
        }
    }

    pub fn add_rule(&mut self, rule: SignalRule) {
        self.entries.push(Entry {
            rule,
            state: SignalState::default(),
        });
    }

    pub fn rules(&self) -> impl Iterator<Item = &SignalRule> {
        self.entries.iter().map(|e| &e.rule)
    }

    pub fn state(&self, id: &SignalId) -> Option<SignalState> {
        self.entries
            .iter()
            .find(|e| &e.rule.id == id)
            .map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every rule against `view`, in rule order, and commits the result.
    ///
    /// On error the engine is left exactly as it was.
    pub fn evaluate(&mut self, view: &mut dyn SnapshotView) -> Result<Vec<FiredSignal>, GraphError> {
        let pass = self.prepare(view)?;
        Ok(self.commit(pass))
    }

    /// Computes the next states and firings without applying them.
    pub fn prepare(&self, view: &mut dyn SnapshotView) -> Result<SignalPass, GraphError> {
        let mut states = Vec::with_capacity(self.entries.len());
        let mut fired = Vec::new();
        for entry in &self.entries {
            let value = match view.latest(&entry.rule.series)? {
                Some(v) if !v.is_nan() => v,
                _ => {
                    states.push(entry.state);
                    continue;
                }
            };
            let (state, hit) = entry
                .state
                .step(entry.rule.trigger, entry.rule.threshold, value);
            if hit {
                fired.push(FiredSignal {
                    id: entry.rule.id.clone(),
                    name: entry.rule.name.clone(),
                    value,
                });
            }
            states.push(state);
        }
        Ok(SignalPass { states, fired })
    }

    pub fn commit(&mut self, pass: SignalPass) -> Vec<FiredSignal> {
        for (entry, state) in self.entries.iter_mut().zip(pass.states) {
            entry.state = state;
        }
        for f in &pass.fired {
            log::info!("signal {} fired at {}", f.id, f.value);
        }
        pass.fired
    }
}

/// Uncommitted outcome of one signal engine pass.
#[derive(Debug)]
pub struct SignalPass {
    states: Vec<SignalState>,
    fired: Vec<FiredSignal>,
}

impl SignalPass {
    pub fn fired(&self) -> &[FiredSignal] {
        &self.fired
    }
}
