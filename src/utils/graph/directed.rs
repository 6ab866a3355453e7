//! Adjacency-list directed graph.

use crate::{
    utils::graph::{NodeId, Successors},
    Error, Result,
};

/// A directed graph with typed node data and unlabeled, deduplicated edges.
///
/// Nodes are stored contiguously and addressed by [`NodeId`]; successor lists keep
/// insertion order, which keeps every traversal deterministic.
///
/// # Examples
///
/// ```rust,ignore
/// use classfold::utils::graph::{DirectedGraph, Successors};
///
/// let mut graph: DirectedGraph<&str> = DirectedGraph::new();
/// let a = graph.add_node("A");
/// let b = graph.add_node("B");
/// graph.add_edge(a, b)?;
/// assert_eq!(graph.successors(a), &[b]);
/// ```
#[derive(Debug, Clone)]
pub struct DirectedGraph<N> {
    nodes: Vec<N>,
    outgoing: Vec<Vec<NodeId>>,
    edge_count: usize,
}

impl<N> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DirectedGraph<N> {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        DirectedGraph {
            nodes: Vec::new(),
            outgoing: Vec::new(),
            edge_count: 0,
        }
    }

    /// Creates an empty graph with room for `node_capacity` nodes.
    #[must_use]
    pub fn with_capacity(node_capacity: usize) -> Self {
        DirectedGraph {
            nodes: Vec::with_capacity(node_capacity),
            outgoing: Vec::with_capacity(node_capacity),
            edge_count: 0,
        }
    }

    /// Adds a node and returns its id.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(data);
        self.outgoing.push(Vec::new());
        id
    }

    /// Adds an edge `source -> target`; adding an existing edge again has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if either endpoint does not exist.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<()> {
        if target.index() >= self.nodes.len() {
            return Err(Error::GraphError(format!("edge target {target} does not exist")));
        }
        let Some(successors) = self.outgoing.get_mut(source.index()) else {
            return Err(Error::GraphError(format!("edge source {source} does not exist")));
        };
        if !successors.contains(&target) {
            successors.push(target);
            self.edge_count += 1;
        }
        Ok(())
    }

    /// Returns the data of a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&N> {
        self.nodes.get(id.index())
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::new)
    }
}

impl<N> Successors for DirectedGraph<N> {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn successors(&self, node: NodeId) -> &[NodeId] {
        self.outgoing.get(node.index()).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_edge_deduplicates() {
        let mut graph: DirectedGraph<char> = DirectedGraph::new();
        let a = graph.add_node('a');
        let b = graph.add_node('b');
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, b).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.successors(a), &[b]);
        assert_eq!(graph.node(b), Some(&'b'));
    }

    #[test]
    fn test_add_edge_rejects_unknown_nodes() {
        let mut graph: DirectedGraph<char> = DirectedGraph::new();
        let a = graph.add_node('a');
        assert!(matches!(graph.add_edge(a, NodeId::new(3)), Err(Error::GraphError(_))));
        assert!(matches!(graph.add_edge(NodeId::new(3), a), Err(Error::GraphError(_))));
    }
}
