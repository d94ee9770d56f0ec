//! Batch evaluator: one-shot resolution of a graph over fixed input arrays.
//!
//! # Evaluation Semantics
//!
//! - Depth-first from each requested handle, memoized for the whole pass
//! - `Base`: a copy of the configured input for its series key
//! - `Indicator`: input resolved first, then handed to the indicator port;
//!   the requested output column falls back to the primary output
//! - `Formula`: element-wise over `max(len(left), len(right))`, a side that
//!   is too short contributes `NaN`
//! - A handle met again while still on the resolution path is a cycle

use crate::domain::error::GraphError;
use crate::domain::graph::{Graph, Handle, Node, SeriesKey};
use crate::domain::snapshot::Snapshot;
use crate::ports::indicator_port::IndicatorPort;
use std::collections::{HashMap, HashSet};

pub struct BatchEvaluator<'a> {
    graph: &'a Graph,
    indicators: &'a dyn IndicatorPort,
    inputs: HashMap<SeriesKey, Vec<f64>>,
}

impl<'a> BatchEvaluator<'a> {
    pub fn new(graph: &'a Graph, indicators: &'a dyn IndicatorPort) -> Self {
        Self {
            graph,
            indicators,
            inputs: HashMap::new(),
        }
    }

    pub fn with_base(mut self, key: SeriesKey, values: Vec<f64>) -> Self {
        self.set_base(key, values);
        self
    }

    pub fn set_base(&mut self, key: SeriesKey, values: Vec<f64>) {
        self.inputs.insert(key, values);
    }

    /// Resolves `targets` (every non-base node when empty) in a fresh pass.
    pub fn evaluate(&self, targets: &[Handle]) -> Result<Snapshot, GraphError> {
        let targets: Vec<Handle> = if targets.is_empty() {
            self.graph
                .handles()
                .filter(|h| self.graph.node(*h).is_ok_and(|n| !n.is_base()))
                .collect()
        } else {
            targets.to_vec()
        };
        log::debug!("batch pass over {} target(s)", targets.len());

        let mut pass = Pass {
            evaluator: self,
            memo: HashMap::new(),
            resolving: HashSet::new(),
        };
        for &target in &targets {
            pass.resolve(target)?;
        }

        let mut values = HashMap::with_capacity(targets.len());
        for target in targets {
            if let Some(series) = pass.memo.get(&target) {
                values.insert(target, series.clone());
            }
        }
        Ok(Snapshot::new(self.graph, values))
    }
}

struct Pass<'p, 'a> {
    evaluator: &'p BatchEvaluator<'a>,
    memo: HashMap<Handle, Vec<f64>>,
    resolving: HashSet<Handle>,
}

impl Pass<'_, '_> {
    fn resolve(&mut self, handle: Handle) -> Result<(), GraphError> {
        if self.memo.contains_key(&handle) {
            return Ok(());
        }
        if !self.resolving.insert(handle) {
            return Err(GraphError::CycleDetected { handle });
        }

        let evaluator = self.evaluator;
        let values = match evaluator.graph.node(handle)? {
            Node::Base(key) => evaluator
                .inputs
                .get(key)
                .cloned()
                .ok_or_else(|| GraphError::MissingBaseSeries { key: key.clone() })?,
            Node::Indicator { input, spec } => {
                self.resolve(*input)?;
                let output = evaluator.indicators.apply(spec, &self.memo[input])?;
                output.into_selected(spec.output.as_deref())
            }
            Node::Formula {
                left,
                right,
                combiner,
            } => {
                self.resolve(*left)?;
                self.resolve(*right)?;
                let l = &self.memo[left];
                let r = &self.memo[right];
                let len = l.len().max(r.len());
                (0..len)
                    .map(|i| {
                        let a = l.get(i).copied().unwrap_or(f64::NAN);
                        let b = r.get(i).copied().unwrap_or(f64::NAN);
                        combiner.apply(a, b)
                    })
                    .collect()
            }
        };

        self.resolving.remove(&handle);
        self.memo.insert(handle, values);
        Ok(())
    }
}
