//! Snapshots: per-handle value views produced by an evaluation pass.
//!
//! - `Snapshot`: immutable result of a batch pass, full series per handle
//! - `IndexedView`: a batch snapshot seen as of one bar index
//! - `SnapshotView`: the query surface signal engines read through; the
//!   streaming runtime implements it with a lazy resolver

use crate::domain::error::GraphError;
use crate::domain::graph::{Graph, GraphId, Handle, NamedKey};
use std::collections::HashMap;
use std::fmt;

/// Reference to a series either by handle or by named key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesRef {
    Handle(Handle),
    Named(NamedKey),
}

impl From<Handle> for SeriesRef {
    fn from(handle: Handle) -> Self {
        SeriesRef::Handle(handle)
    }
}

impl From<NamedKey> for SeriesRef {
    fn from(key: NamedKey) -> Self {
        SeriesRef::Named(key)
    }
}

impl fmt::Display for SeriesRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesRef::Handle(h) => write!(f, "{}", h),
            SeriesRef::Named(k) => write!(f, "{}", k),
        }
    }
}

pub trait SnapshotView {
    /// Values for `series`, or `None` when the series is known but not available.
    fn try_get(&mut self, series: &SeriesRef) -> Result<Option<&[f64]>, GraphError>;

    fn latest(&mut self, series: &SeriesRef) -> Result<Option<f64>, GraphError> {
        Ok(self.try_get(series)?.and_then(|values| values.last().copied()))
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    graph: GraphId,
    node_count: usize,
    names: HashMap<NamedKey, Handle>,
    values: HashMap<Handle, Vec<f64>>,
}

impl Snapshot {
    pub(crate) fn new(graph: &Graph, values: HashMap<Handle, Vec<f64>>) -> Self {
        Self {
            graph: graph.id,
            node_count: graph.len(),
            names: graph.names.clone(),
            values,
        }
    }

    fn check(&self, handle: Handle) -> Result<(), GraphError> {
        if handle.graph() == self.graph && handle.index() < self.node_count {
            Ok(())
        } else {
            Err(GraphError::UnknownHandle { handle })
        }
    }

    pub fn resolve(&self, series: &SeriesRef) -> Result<Handle, GraphError> {
        let handle = match series {
            SeriesRef::Handle(h) => *h,
            SeriesRef::Named(key) => self
                .names
                .get(key)
                .copied()
                .ok_or_else(|| GraphError::UnknownKey { key: key.clone() })?,
        };
        self.check(handle)?;
        Ok(handle)
    }

    pub fn get(&self, series: impl Into<SeriesRef>) -> Result<Option<&[f64]>, GraphError> {
        let handle = self.resolve(&series.into())?;
        Ok(self.values.get(&handle).map(Vec::as_slice))
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.values.contains_key(&handle)
    }

    /// Materialized handles in allocation order.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.values.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Length of the longest materialized series.
    pub fn bar_count(&self) -> usize {
        self.values.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Takes ownership of the materialized series.
    pub fn into_values(self) -> HashMap<Handle, Vec<f64>> {
        self.values
    }

    pub fn at(&self, index: usize) -> IndexedView<'_> {
        IndexedView {
            snapshot: self,
            index,
        }
    }
}

impl SnapshotView for Snapshot {
    fn try_get(&mut self, series: &SeriesRef) -> Result<Option<&[f64]>, GraphError> {
        let handle = self.resolve(series)?;
        Ok(self.values.get(&handle).map(Vec::as_slice))
    }
}

/// A batch snapshot as it looked at bar `index`: every query returns the
/// single value at that index.
pub struct IndexedView<'a> {
    snapshot: &'a Snapshot,
    index: usize,
}

impl SnapshotView for IndexedView<'_> {
    fn try_get(&mut self, series: &SeriesRef) -> Result<Option<&[f64]>, GraphError> {
        let handle = self.snapshot.resolve(series)?;
        let index = self.index;
        Ok(self
            .snapshot
            .values
            .get(&handle)
            .filter(|values| index < values.len())
            .map(|values| &values[index..=index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::GraphBuilder;
    use crate::domain::graph::{IndicatorSpec, SeriesKey};

    fn sample() -> (Snapshot, Handle, Handle) {
        let mut b = GraphBuilder::new();
        let base = b.allocate_base(SeriesKey::new("BHP", "1d"));
        let fast = b
            .allocate_indicator(base, IndicatorSpec::new("SMA", vec![2.0]))
            .unwrap();
        b.bind_name(NamedKey::new("fast"), fast).unwrap();
        let graph = b.build().unwrap();

        let mut values = HashMap::new();
        values.insert(fast, vec![f64::NAN, 1.5, 2.5]);
        (Snapshot::new(&graph, values), base, fast)
    }

    #[test]
    fn get_by_handle_and_name() {
        let (snap, _, fast) = sample();
        assert_eq!(snap.get(fast).unwrap().unwrap().len(), 3);
        assert_eq!(
            snap.get(NamedKey::new("fast")).unwrap().unwrap()[2],
            2.5
        );
    }

    #[test]
    fn known_but_unmaterialized_is_none() {
        let (snap, base, _) = sample();
        assert!(snap.get(base).unwrap().is_none());
    }

    #[test]
    fn unknown_name_is_error() {
        let (snap, _, _) = sample();
        let err = snap.get(NamedKey::new("slow")).unwrap_err();
        assert!(matches!(err, GraphError::UnknownKey { .. }));
    }

    #[test]
    fn indexed_view_returns_single_value() {
        let (snap, _, fast) = sample();
        let mut view = snap.at(1);
        assert_eq!(view.latest(&fast.into()).unwrap(), Some(1.5));

        let mut past_end = snap.at(5);
        assert_eq!(past_end.latest(&fast.into()).unwrap(), None);
    }

    #[test]
    fn latest_of_full_snapshot_is_last_value() {
        let (mut snap, _, fast) = sample();
        assert_eq!(snap.latest(&SeriesRef::Handle(fast)).unwrap(), Some(2.5));
        assert_eq!(snap.bar_count(), 3);
    }
}
