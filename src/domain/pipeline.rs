//! Signal pipeline: one synchronous pass per observation.
//!
//! runtime update -> signal engine -> group engine -> dispatcher
//!
//! Both engines compute their pass before either commits, and nothing is
//! dispatched unless the whole pass succeeded. Observations must arrive in
//! chronological order; the pipeline never reorders them.

use crate::domain::dispatch::Dispatcher;
use crate::domain::error::GraphError;
use crate::domain::graph::SeriesKey;
use crate::domain::group_signal::GroupSignalEngine;
use crate::domain::incremental::IncrementalRuntime;
use crate::domain::signal::{FiredSignal, SignalEngine};
use crate::domain::snapshot::{SeriesRef, Snapshot, SnapshotView};
use chrono::{DateTime, Utc};

/// Signal and group rules plus the dispatcher their firings go to.
#[derive(Default)]
pub struct RuleSet {
    pub signals: SignalEngine,
    pub groups: GroupSignalEngine,
    pub dispatcher: Dispatcher,
}

impl RuleSet {
    pub fn new(signals: SignalEngine, groups: GroupSignalEngine, dispatcher: Dispatcher) -> Self {
        Self {
            signals,
            groups,
            dispatcher,
        }
    }

    /// Every series a rule or group condition reads, in declaration order.
    pub fn series(&self) -> Vec<SeriesRef> {
        let mut out: Vec<SeriesRef> = Vec::new();
        let refs = self
            .signals
            .rules()
            .map(|r| &r.series)
            .chain(self.groups.rules().flat_map(|g| g.conditions.iter().map(|c| &c.series)));
        for series in refs {
            if !out.contains(series) {
                out.push(series.clone());
            }
        }
        out
    }

    /// Evaluates both engines against `view`, commits, then dispatches.
    pub fn run_pass(
        &mut self,
        view: &mut dyn SnapshotView,
        now: DateTime<Utc>,
    ) -> Result<Vec<FiredSignal>, GraphError> {
        let signal_pass = self.signals.prepare(view)?;
        let group_pass = self.groups.prepare(view, now)?;

        let mut fired = self.signals.commit(signal_pass);
        fired.extend(self.groups.commit(group_pass));
        for f in &fired {
            self.dispatcher.dispatch(&f.id, &f.name, f.value, now);
        }
        Ok(fired)
    }

    /// Replays the rules bar by bar over a batch snapshot.
    ///
    /// `timestamps[i]` stamps bar `i`; bars without a timestamp are not
    /// replayed.
    pub fn replay(
        &mut self,
        snapshot: &Snapshot,
        timestamps: &[DateTime<Utc>],
    ) -> Result<Vec<(DateTime<Utc>, FiredSignal)>, GraphError> {
        let mut out = Vec::new();
        for (i, &now) in timestamps.iter().enumerate() {
            for fired in self.run_pass(&mut snapshot.at(i), now)? {
                out.push((now, fired));
            }
        }
        Ok(out)
    }
}

pub struct SignalPipeline {
    runtime: IncrementalRuntime,
    rules: RuleSet,
}

impl SignalPipeline {
    /// Activates every series the rules read, so lazy runtimes maintain
    /// them from the first observation.
    pub fn new(mut runtime: IncrementalRuntime, rules: RuleSet) -> Result<Self, GraphError> {
        for series in rules.series() {
            let handle = runtime.resolve_ref(&series)?;
            runtime.activate(handle)?;
        }
        Ok(Self { runtime, rules })
    }

    pub fn runtime(&self) -> &IncrementalRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut IncrementalRuntime {
        &mut self.runtime
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Feeds one base observation and runs one full pass.
    pub fn on_observation(
        &mut self,
        key: &SeriesKey,
        value: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<FiredSignal>, GraphError> {
        self.runtime.on_base_value(key, value)?;
        self.rules.run_pass(&mut self.runtime, now)
    }
}
