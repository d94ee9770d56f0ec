//! Graph builder: allocates handles and records structure, never evaluates.

use crate::domain::error::GraphError;
use crate::domain::graph::{
    Combiner, Graph, GraphId, Handle, IndicatorSpec, NamedKey, Node, SeriesKey, next_graph_id,
};
use std::collections::HashMap;

pub struct GraphBuilder {
    id: GraphId,
    nodes: Vec<Option<Node>>,
    names: HashMap<NamedKey, Handle>,
    bases: HashMap<SeriesKey, Handle>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            id: next_graph_id(),
            nodes: Vec::new(),
            names: HashMap::new(),
            bases: HashMap::new(),
        }
    }

    fn next_handle(&self) -> Handle {
        Handle::new(self.id, self.nodes.len() as u32)
    }

    fn check(&self, handle: Handle) -> Result<(), GraphError> {
        if handle.graph() == self.id && handle.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownHandle { handle })
        }
    }

    /// Returns the base handle for `key`, allocating it on first use.
    pub fn allocate_base(&mut self, key: SeriesKey) -> Handle {
        if let Some(handle) = self.bases.get(&key) {
            return *handle;
        }
        let handle = self.next_handle();
        self.nodes.push(Some(Node::Base(key.clone())));
        self.bases.insert(key, handle);
        handle
    }

    pub fn allocate_indicator(
        &mut self,
        input: Handle,
        spec: IndicatorSpec,
    ) -> Result<Handle, GraphError> {
        self.check(input)?;
        let handle = self.next_handle();
        self.nodes.push(Some(Node::Indicator { input, spec }));
        Ok(handle)
    }

    pub fn allocate_formula(
        &mut self,
        left: Handle,
        right: Handle,
        combiner: impl Into<Combiner>,
    ) -> Result<Handle, GraphError> {
        self.check(left)?;
        self.check(right)?;
        let handle = self.next_handle();
        self.nodes.push(Some(Node::Formula {
            left,
            right,
            combiner: combiner.into(),
        }));
        Ok(handle)
    }

    /// Allocates a handle whose node is supplied later with [`define`](Self::define).
    ///
    /// Lets callers wire nodes that refer to each other in any declaration
    /// order. Nothing stops a reserved node from depending on itself; cycles
    /// are reported at evaluation time.
    pub fn reserve(&mut self) -> Handle {
        let handle = self.next_handle();
        self.nodes.push(None);
        handle
    }

    /// Sets the node for a reserved handle. Defining a handle twice replaces it;
    /// a replaced base node stops receiving its scope's observations.
    pub fn define(&mut self, handle: Handle, node: Node) -> Result<(), GraphError> {
        self.check(handle)?;
        for input in node.inputs() {
            self.check(input)?;
        }
        if let Some(Node::Base(old)) = &self.nodes[handle.index()] {
            if self.bases.get(old) == Some(&handle) {
                self.bases.remove(old);
            }
        }
        if let Node::Base(key) = &node {
            self.bases.entry(key.clone()).or_insert(handle);
        }
        self.nodes[handle.index()] = Some(node);
        Ok(())
    }

    pub fn bind_name(&mut self, key: NamedKey, handle: Handle) -> Result<(), GraphError> {
        self.check(handle)?;
        self.names.insert(key, handle);
        Ok(())
    }

    pub fn resolve_name(&self, key: &NamedKey) -> Result<Handle, GraphError> {
        self.names
            .get(key)
            .copied()
            .ok_or_else(|| GraphError::UnknownKey { key: key.clone() })
    }

    /// Freezes the node table. Fails if a reserved handle was never defined.
    pub fn build(self) -> Result<Graph, GraphError> {
        let id = self.id;
        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                node.ok_or(GraphError::UnknownHandle {
                    handle: Handle::new(id, i as u32),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Graph {
            id,
            nodes,
            names: self.names,
            bases: self.bases,
        })
    }
}
