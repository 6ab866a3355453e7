//! Directed graph infrastructure.
//!
//! A small adjacency-list graph with the handful of algorithms the class-initializer
//! deadlock detector needs. Algorithms are written against the [`Successors`] trait so
//! they work for any graph that can enumerate outgoing edges.

pub mod algorithms;
mod directed;
mod node;

pub use directed::DirectedGraph;
pub use node::NodeId;

/// Forward adjacency access.
pub trait Successors {
    /// Number of nodes; valid node ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Direct successors of `node`, in insertion order.
    fn successors(&self, node: NodeId) -> &[NodeId];
}
