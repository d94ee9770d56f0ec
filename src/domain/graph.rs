//! Graph model: handles, nodes, keys and the immutable node table.
//!
//! A graph is a closed set of three node shapes:
//! - `Base`: the raw input series for one (symbol, timeframe) scope
//! - `Indicator`: one input handle plus an indicator spec
//! - `Formula`: two input handles combined element-wise by a pure function
//!
//! Handles are indices into the node table, tagged with the id of the graph
//! that allocated them so a handle from one graph never resolves in another.

use crate::domain::error::GraphError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_graph_id() -> GraphId {
    GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u32);

/// Opaque, copyable node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    graph: GraphId,
    index: u32,
}

impl Handle {
    pub(crate) fn new(graph: GraphId, index: u32) -> Self {
        Self { graph, index }
    }

    pub(crate) fn graph(&self) -> GraphId {
        self.graph
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Identifies one base input scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: String,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

/// Stable alternate lookup for a handle, independent of allocation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedKey {
    pub name: String,
    pub output: Option<String>,
}

impl NamedKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: None,
        }
    }

    pub fn with_output(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: Some(output.into()),
        }
    }
}

impl fmt::Display for NamedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.output {
            Some(output) => write!(f, "{}.{}", self.name, output),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Indicator identity plus parameters and an optional output selector.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub name: String,
    pub params: Vec<f64>,
    pub output: Option<String>,
}

impl IndicatorSpec {
    pub fn new(name: impl Into<String>, params: Vec<f64>) -> Self {
        Self {
            name: name.into().to_uppercase(),
            params,
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "{}({})", self.name, params.join(","))?;
        if let Some(output) = &self.output {
            write!(f, ".{}", output)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

impl BinaryOp {
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
            BinaryOp::Min => left.min(right),
            BinaryOp::Max => left.max(right),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "add" | "+" => Some(BinaryOp::Add),
            "sub" | "-" => Some(BinaryOp::Sub),
            "mul" | "*" => Some(BinaryOp::Mul),
            "div" | "/" => Some(BinaryOp::Div),
            "min" => Some(BinaryOp::Min),
            "max" => Some(BinaryOp::Max),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
        };
        f.write_str(s)
    }
}

/// Pure binary function over scalars used by formula nodes.
///
/// Must be deterministic and side-effect free: results are memoized per pass
/// and recomputed freely by the incremental runtime.
#[derive(Clone)]
pub struct Combiner {
    name: String,
    func: Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>,
}

impl Combiner {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, left: f64, right: f64) -> f64 {
        (self.func)(left, right)
    }
}

impl From<BinaryOp> for Combiner {
    fn from(op: BinaryOp) -> Self {
        Combiner::new(op.to_string(), move |l, r| op.apply(l, r))
    }
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combiner").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Base(SeriesKey),
    Indicator { input: Handle, spec: IndicatorSpec },
    Formula {
        left: Handle,
        right: Handle,
        combiner: Combiner,
    },
}

impl Node {
    pub fn inputs(&self) -> Vec<Handle> {
        match self {
            Node::Base(_) => Vec::new(),
            Node::Indicator { input, .. } => vec![*input],
            Node::Formula { left, right, .. } => vec![*left, *right],
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, Node::Base(_))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Base(key) => write!(f, "BASE {}", key),
            Node::Indicator { input, spec } => write!(f, "{} of {}", spec, input),
            Node::Formula {
                left,
                right,
                combiner,
            } => write!(f, "{}({}, {})", combiner.name(), left, right),
        }
    }
}

/// Immutable node table produced by [`crate::domain::builder::GraphBuilder`].
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) id: GraphId,
    pub(crate) nodes: Vec<Node>,
    pub(crate) names: HashMap<NamedKey, Handle>,
    pub(crate) bases: HashMap<SeriesKey, Handle>,
}

impl Graph {
    pub fn node(&self, handle: Handle) -> Result<&Node, GraphError> {
        if handle.graph() != self.id {
            return Err(GraphError::UnknownHandle { handle });
        }
        self.nodes
            .get(handle.index())
            .ok_or(GraphError::UnknownHandle { handle })
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.node(handle).is_ok()
    }

    pub fn resolve_name(&self, key: &NamedKey) -> Result<Handle, GraphError> {
        self.names
            .get(key)
            .copied()
            .ok_or_else(|| GraphError::UnknownKey { key: key.clone() })
    }

    pub fn base(&self, key: &SeriesKey) -> Option<Handle> {
        self.bases.get(key).copied()
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        (0..self.nodes.len()).map(move |i| Handle::new(self.id, i as u32))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Named keys bound to handles, sorted by key.
    pub fn names(&self) -> Vec<(&NamedKey, Handle)> {
        let mut names: Vec<_> = self.names.iter().map(|(k, h)| (k, *h)).collect();
        names.sort();
        names
    }

    /// First name bound to `handle`, if any.
    pub fn name_of(&self, handle: Handle) -> Option<&NamedKey> {
        self.names
            .iter()
            .filter(|(_, h)| **h == handle)
            .map(|(k, _)| k)
            .min()
    }

    /// Every handle `roots` transitively depends on, roots included.
    pub fn dependency_closure(&self, roots: &[Handle]) -> Result<Vec<Handle>, GraphError> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<Handle> = roots.to_vec();
        let mut out = Vec::new();
        while let Some(handle) = stack.pop() {
            let node = self.node(handle)?;
            if seen[handle.index()] {
                continue;
            }
            seen[handle.index()] = true;
            out.push(handle);
            stack.extend(node.inputs());
        }
        out.sort();
        Ok(out)
    }

    /// Dependencies-first ordering of `subset` (every handle in `subset` and
    /// none outside it). Fails on the first handle found on a cycle.
    pub fn topological_order(&self, subset: &[Handle]) -> Result<Vec<Handle>, GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut included = vec![false; self.nodes.len()];
        for &handle in subset {
            self.node(handle)?;
            included[handle.index()] = true;
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(subset.len());
        let mut sorted: Vec<Handle> = subset.to_vec();
        sorted.sort();

        for root in sorted {
            if marks[root.index()] != Mark::Unvisited {
                continue;
            }
            // (handle, inputs already pushed)
            let mut stack = vec![(root, false)];
            while let Some((handle, expanded)) = stack.pop() {
                let idx = handle.index();
                if expanded {
                    marks[idx] = Mark::Done;
                    order.push(handle);
                    continue;
                }
                match marks[idx] {
                    Mark::Done => continue,
                    Mark::InProgress => return Err(GraphError::CycleDetected { handle }),
                    Mark::Unvisited => {}
                }
                marks[idx] = Mark::InProgress;
                stack.push((handle, true));
                for input in self.node(handle)?.inputs() {
                    self.node(input)?;
                    if !included[input.index()] {
                        continue;
                    }
                    match marks[input.index()] {
                        Mark::InProgress => {
                            return Err(GraphError::CycleDetected { handle: input });
                        }
                        Mark::Unvisited => stack.push((input, false)),
                        Mark::Done => {}
                    }
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::GraphBuilder;

    #[test]
    fn handle_display_is_index() {
        let h = Handle::new(GraphId(7), 3);
        assert_eq!(h.to_string(), "#3");
    }

    #[test]
    fn indicator_spec_display() {
        let spec = IndicatorSpec::new("bollinger", vec![20.0, 2.0]).with_output("upper");
        assert_eq!(spec.to_string(), "BOLLINGER(20,2).upper");
        assert_eq!(IndicatorSpec::new("sma", vec![14.0]).to_string(), "SMA(14)");
    }

    #[test]
    fn binary_op_parse_and_apply() {
        assert_eq!(BinaryOp::parse("sub"), Some(BinaryOp::Sub));
        assert_eq!(BinaryOp::parse(" / "), Some(BinaryOp::Div));
        assert_eq!(BinaryOp::parse("pow"), None);
        assert_eq!(BinaryOp::Sub.apply(1.0, 10.0), -9.0);
        assert!(BinaryOp::Div.apply(1.0, 0.0).is_infinite());
        assert!(BinaryOp::Div.apply(0.0, 0.0).is_nan());
    }

    #[test]
    fn handle_from_other_graph_is_unknown() {
        let mut a = GraphBuilder::new();
        let base_a = a.allocate_base(SeriesKey::new("BHP", "1d"));
        let _graph_a = a.build().unwrap();

        let mut b = GraphBuilder::new();
        b.allocate_base(SeriesKey::new("BHP", "1d"));
        let graph_b = b.build().unwrap();

        assert_eq!(
            graph_b.node(base_a).unwrap_err(),
            GraphError::UnknownHandle { handle: base_a }
        );
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let mut b = GraphBuilder::new();
        let base = b.allocate_base(SeriesKey::new("BHP", "1d"));
        let fast = b
            .allocate_indicator(base, IndicatorSpec::new("SMA", vec![2.0]))
            .unwrap();
        let slow = b
            .allocate_indicator(fast, IndicatorSpec::new("SMA", vec![2.0]))
            .unwrap();
        let diff = b.allocate_formula(fast, slow, BinaryOp::Sub).unwrap();
        let graph = b.build().unwrap();

        let order = graph.topological_order(&[diff, slow, fast, base]).unwrap();
        let pos = |h: Handle| order.iter().position(|x| *x == h).unwrap();
        assert!(pos(base) < pos(fast));
        assert!(pos(fast) < pos(slow));
        assert!(pos(slow) < pos(diff));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn topological_order_detects_cycle() {
        let mut b = GraphBuilder::new();
        let x = b.reserve();
        let y = b.reserve();
        b.define(x, Node::Indicator {
            input: y,
            spec: IndicatorSpec::new("SMA", vec![2.0]),
        })
        .unwrap();
        b.define(y, Node::Indicator {
            input: x,
            spec: IndicatorSpec::new("SMA", vec![2.0]),
        })
        .unwrap();
        let graph = b.build().unwrap();

        let err = graph.topological_order(&[x, y]).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
    }

    #[test]
    fn dependency_closure_includes_roots_and_inputs() {
        let mut b = GraphBuilder::new();
        let base = b.allocate_base(SeriesKey::new("BHP", "1d"));
        let other = b.allocate_base(SeriesKey::new("CBA", "1d"));
        let fast = b
            .allocate_indicator(base, IndicatorSpec::new("EMA", vec![3.0]))
            .unwrap();
        let graph = b.build().unwrap();

        let closure = graph.dependency_closure(&[fast]).unwrap();
        assert_eq!(closure, vec![base, fast]);
        assert!(!closure.contains(&other));
    }
}
