//! Group signal engine: multi-condition aggregation with debounce.
//!
//! # Evaluation Semantics
//!
//! - Each condition is tested on its own: level conditions hold while the
//!   threshold test holds, cross conditions hold on the pass that crosses.
//!   A missing or `NaN` value counts as not holding and leaves the
//!   condition's previous value untouched.
//! - The aggregate is applied literally to the holding count; see
//!   [`Aggregation::holds`].
//! - While the aggregate holds, consecutive qualifying passes accumulate;
//!   any failing pass resets the run and re-arms the group.
//! - A group fires once per run, when the run first satisfies its
//!   [`DebounceWindow`].

use crate::domain::error::GraphError;
use crate::domain::signal::{FiredSignal, SignalId, TriggerKind};
use crate::domain::snapshot::{SeriesRef, SnapshotView};
use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct SignalCondition {
    pub series: SeriesRef,
    pub trigger: TriggerKind,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    All,
    Any,
    AtLeast(usize),
    Percent(f64),
}

impl Aggregation {
    /// `All`: every condition. `Any`: at least one. `AtLeast(k)`: at least
    /// `max(1, k)`. `Percent(p)`: at least `ceil(total * p / 100)`.
    pub fn holds(&self, count: usize, total: usize) -> bool {
        match *self {
            Aggregation::All => count == total,
            Aggregation::Any => count > 0,
            Aggregation::AtLeast(k) => count >= k.max(1),
            Aggregation::Percent(p) => count as f64 >= (total as f64 * p / 100.0).ceil(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebounceWindow {
    /// Consecutive qualifying passes; `0` behaves as `1`.
    Bars(u32),
    /// Wall-clock time the aggregate must have held, measured between pass
    /// timestamps.
    Duration(TimeDelta),
}

impl Default for DebounceWindow {
    fn default() -> Self {
        DebounceWindow::Bars(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSignalRule {
    pub id: SignalId,
    pub name: String,
    pub conditions: Vec<SignalCondition>,
    pub aggregation: Aggregation,
    pub window: DebounceWindow,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupState {
    pub previous: Vec<Option<f64>>,
    pub active_bars: u32,
    pub is_active: bool,
    pub active_since: Option<DateTime<Utc>>,
}

impl GroupState {
    fn for_rule(rule: &GroupSignalRule) -> Self {
        Self {
            previous: vec![None; rule.conditions.len()],
            ..Self::default()
        }
    }
}

struct Entry {
    rule: GroupSignalRule,
    state: GroupState,
}

#[derive(Default)]
pub struct GroupSignalEngine {
    entries: Vec<Entry>,
}

impl GroupSignalEngine {
    pub fn new(rules: Vec<GroupSignalRule>) -> Self {
        let mut engine = Self::default();
        for rule in rules {
            engine.add_rule(rule);
        }
        engine
    }

    pub fn add_rule(&mut self, rule: GroupSignalRule) {
        let state = GroupState::for_rule(&rule);
        self.entries.push(Entry { rule, state });
    }

    pub fn rules(&self) -> impl Iterator<Item = &GroupSignalRule> {
        self.entries.iter().map(|e| &e.rule)
    }

    pub fn state(&self, id: &SignalId) -> Option<&GroupState> {
        self.entries
            .iter()
            .find(|e| &e.rule.id == id)
            .map(|e| &e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every group against `view` for the pass stamped `now` and
    /// commits the result. On error nothing is committed.
    pub fn evaluate(
        &mut self,
        view: &mut dyn SnapshotView,
        now: DateTime<Utc>,
    ) -> Result<Vec<FiredSignal>, GraphError> {
        let pass = self.prepare(view, now)?;
        Ok(self.commit(pass))
    }

    pub fn prepare(
        &self,
        view: &mut dyn SnapshotView,
        now: DateTime<Utc>,
    ) -> Result<GroupPass, GraphError> {
        let mut states = Vec::with_capacity(self.entries.len());
        let mut fired = Vec::new();
        for entry in &self.entries {
            let (state, hit) = step(&entry.rule, &entry.state, view, now)?;
            if let Some(value) = hit {
                fired.push(FiredSignal {
                    id: entry.rule.id.clone(),
                    name: entry.rule.name.clone(),
                    value,
                });
            }
            states.push(state);
        }
        Ok(GroupPass { states, fired })
    }

    pub fn commit(&mut self, pass: GroupPass) -> Vec<FiredSignal> {
        for (entry, state) in self.entries.iter_mut().zip(pass.states) {
            if state.is_active && !entry.state.is_active {
                log::info!(
                    "group {} fired after {} qualifying pass(es)",
                    entry.rule.id,
                    state.active_bars
                );
            }
            entry.state = state;
        }
        pass.fired
    }
}

/// Uncommitted outcome of one group engine pass.
#[derive(Debug)]
pub struct GroupPass {
    states: Vec<GroupState>,
    fired: Vec<FiredSignal>,
}

impl GroupPass {
    pub fn fired(&self) -> &[FiredSignal] {
        &self.fired
    }
}

fn step(
    rule: &GroupSignalRule,
    current: &GroupState,
    view: &mut dyn SnapshotView,
    now: DateTime<Utc>,
) -> Result<(GroupState, Option<f64>), GraphError> {
    let mut state = current.clone();
    let mut count = 0;
    let mut reported = f64::NAN;

    for (i, condition) in rule.conditions.iter().enumerate() {
        let value = match view.latest(&condition.series)? {
            Some(v) if !v.is_nan() => v,
            _ => continue,
        };
        if i == 0 {
            reported = value;
        }
        let holds = if condition.trigger.is_level() {
            condition.trigger.level_holds(value, condition.threshold)
        } else {
            state.previous[i]
                .is_some_and(|prev| condition.trigger.crossed(prev, value, condition.threshold))
        };
        if holds {
            count += 1;
        }
        state.previous[i] = Some(value);
    }

    if !rule.aggregation.holds(count, rule.conditions.len()) {
        state.active_bars = 0;
        state.is_active = false;
        state.active_since = None;
        return Ok((state, None));
    }

    state.active_bars = state.active_bars.saturating_add(1);
    let since = *state.active_since.get_or_insert(now);
    let reached = match rule.window {
        DebounceWindow::Bars(n) => state.active_bars >= n.max(1),
        DebounceWindow::Duration(d) => now - since >= d,
    };
    if reached && !state.is_active {
        state.is_active = true;
        return Ok((state, Some(reported)));
    }
    Ok((state, None))
}
