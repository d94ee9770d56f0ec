//! Incremental runtime: evaluates a graph one observation at a time.
//!
//! Holds the latest scalar per handle (stored as a length-1 series so it
//! reads like a batch snapshot) and the set of handles currently maintained.
//!
//! # Update protocol
//!
//! 1. A base observation or an indicator emission is stored.
//! 2. Active nodes are walked in dependency order; an indicator whose input
//!    changed this pass is fed the new input, a formula whose left or right
//!    changed is recomputed from the latest cached scalars (`NaN` for a side
//!    with no value yet).
//! 3. Readers query through [`SnapshotView`]; a query for a handle that is
//!    not maintained yet activates it and, for formulas, computes it from
//!    whatever dependency values already exist. Indicators have no history
//!    to replay, so they stay unavailable until their next update.

use crate::domain::error::GraphError;
use crate::domain::graph::{Graph, Handle, Node, SeriesKey};
use crate::domain::snapshot::{SeriesRef, Snapshot, SnapshotView};
use crate::ports::indicator_port::{IndicatorState, StreamingIndicatorPort};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationMode {
    /// Every node is maintained from construction.
    Eager,
    /// Only requested handles and their dependencies are maintained.
    #[default]
    Lazy,
}

pub struct IncrementalRuntime {
    graph: Graph,
    indicators: Box<dyn StreamingIndicatorPort>,
    mode: ActivationMode,
    active: HashSet<Handle>,
    order: Vec<Handle>,
    states: HashMap<Handle, Box<dyn IndicatorState>>,
    cache: HashMap<Handle, Vec<f64>>,
}

impl IncrementalRuntime {
    pub fn new(
        graph: Graph,
        indicators: Box<dyn StreamingIndicatorPort>,
        mode: ActivationMode,
    ) -> Result<Self, GraphError> {
        let mut runtime = Self {
            graph,
            indicators,
            mode,
            active: HashSet::new(),
            order: Vec::new(),
            states: HashMap::new(),
            cache: HashMap::new(),
        };
        if mode == ActivationMode::Eager {
            let all: Vec<Handle> = runtime.graph.handles().collect();
            runtime.activate_all(&all)?;
        }
        Ok(runtime)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn mode(&self) -> ActivationMode {
        self.mode
    }

    pub fn is_active(&self, handle: Handle) -> bool {
        self.active.contains(&handle)
    }

    /// Active handles in dependency order.
    pub fn active_order(&self) -> &[Handle] {
        &self.order
    }

    pub fn resolve_ref(&self, series: &SeriesRef) -> Result<Handle, GraphError> {
        let handle = match series {
            SeriesRef::Handle(h) => *h,
            SeriesRef::Named(key) => self.graph.resolve_name(key)?,
        };
        self.graph.node(handle)?;
        Ok(handle)
    }

    /// Starts maintaining `handle` and everything it depends on.
    ///
    /// Activating an already-active handle does nothing. On error the active
    /// set is left unchanged.
    pub fn activate(&mut self, handle: Handle) -> Result<(), GraphError> {
        self.activate_all(&[handle])
    }

    fn activate_all(&mut self, roots: &[Handle]) -> Result<(), GraphError> {
        let mut added: Vec<Handle> = Vec::new();
        let mut seen: HashSet<Handle> = HashSet::new();
        let mut stack: Vec<Handle> = roots.to_vec();
        while let Some(handle) = stack.pop() {
            if self.active.contains(&handle) || !seen.insert(handle) {
                continue;
            }
            stack.extend(self.graph.node(handle)?.inputs());
            added.push(handle);
        }
        if added.is_empty() {
            return Ok(());
        }

        let mut candidate: Vec<Handle> = self.active.iter().copied().collect();
        candidate.extend(added.iter().copied());
        let order = self.graph.topological_order(&candidate)?;

        let mut states = HashMap::new();
        for &handle in &added {
            if let Node::Indicator { spec, .. } = self.graph.node(handle)? {
                states.insert(handle, self.indicators.create(spec)?);
            }
        }

        log::debug!("activated {} node(s)", added.len());
        self.active.extend(added);
        self.states.extend(states);
        self.order = order;
        Ok(())
    }

    /// Latest value of `handle`, if it has one.
    pub fn value(&self, handle: Handle) -> Option<f64> {
        self.cache.get(&handle).and_then(|v| v.first().copied())
    }

    /// Feeds one observation for the base node of `key` and propagates it.
    ///
    /// Observations for scopes the graph does not contain are ignored.
    pub fn on_base_value(&mut self, key: &SeriesKey, value: f64) -> Result<(), GraphError> {
        match self.graph.base(key) {
            Some(handle) => self.emit(handle, value),
            None => {
                log::debug!("ignoring observation for unknown scope {key}");
                Ok(())
            }
        }
    }

    /// Stores a value emitted for `handle` by an outside collaborator and
    /// propagates it to the active nodes that depend on it.
    pub fn emit(&mut self, handle: Handle, value: f64) -> Result<(), GraphError> {
        self.graph.node(handle)?;
        self.cache.insert(handle, vec![value]);
        let mut dirty = HashSet::from([handle]);
        self.propagate(&mut dirty)
    }

    fn propagate(&mut self, dirty: &mut HashSet<Handle>) -> Result<(), GraphError> {
        for &handle in &self.order {
            if dirty.contains(&handle) {
                continue;
            }
            match self.graph.node(handle)? {
                Node::Base(_) => {}
                Node::Indicator { input, spec } => {
                    if !dirty.contains(input) {
                        continue;
                    }
                    let Some(x) = self.cache.get(input).and_then(|v| v.first().copied()) else {
                        continue;
                    };
                    if let Some(state) = self.states.get_mut(&handle) {
                        let tick = state.update(x);
                        self.cache
                            .insert(handle, vec![tick.select(spec.output.as_deref())]);
                        dirty.insert(handle);
                    }
                }
                Node::Formula {
                    left,
                    right,
                    combiner,
                } => {
                    if !dirty.contains(left) && !dirty.contains(right) {
                        continue;
                    }
                    let l = self.value(*left).unwrap_or(f64::NAN);
                    let r = self.value(*right).unwrap_or(f64::NAN);
                    self.cache.insert(handle, vec![combiner.apply(l, r)]);
                    dirty.insert(handle);
                }
            }
        }
        Ok(())
    }

    /// Computes an unmaintained formula from cached dependency values.
    fn materialize(&mut self, handle: Handle) -> Result<Option<f64>, GraphError> {
        if let Some(v) = self.value(handle) {
            return Ok(Some(v));
        }
        let (left, right, combiner) = match self.graph.node(handle)? {
            Node::Formula {
                left,
                right,
                combiner,
            } => (*left, *right, combiner.clone()),
            _ => return Ok(None),
        };
        let l = self.materialize(left)?;
        let r = self.materialize(right)?;
        if l.is_none() && r.is_none() {
            return Ok(None);
        }
        let value = combiner.apply(l.unwrap_or(f64::NAN), r.unwrap_or(f64::NAN));
        self.cache.insert(handle, vec![value]);
        Ok(Some(value))
    }

    /// Immutable copy of the current live values.
    pub fn published(&self) -> Snapshot {
        Snapshot::new(&self.graph, self.cache.clone())
    }
}

impl SnapshotView for IncrementalRuntime {
    fn try_get(&mut self, series: &SeriesRef) -> Result<Option<&[f64]>, GraphError> {
        let handle = self.resolve_ref(series)?;
        if !self.active.contains(&handle) {
            self.activate(handle)?;
        }
        self.materialize(handle)?;
        Ok(self.cache.get(&handle).map(Vec::as_slice))
    }
}
