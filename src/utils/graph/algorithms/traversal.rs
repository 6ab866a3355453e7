//! Reachability queries.

use crate::utils::graph::{NodeId, Successors};

/// Marks every node reachable from any of `starts` through at least one edge.
///
/// A start node is only marked if it can reach itself again, which makes the result
/// directly usable for "does `x` lead back to `x`" questions.
///
/// # Returns
///
/// A vector indexed by [`NodeId::index`].
pub fn reachable_from<G, I>(graph: &G, starts: I) -> Vec<bool>
where
    G: Successors,
    I: IntoIterator<Item = NodeId>,
{
    let mut reached = vec![false; graph.node_count()];
    let mut worklist: Vec<NodeId> = Vec::new();
    for start in starts {
        worklist.extend_from_slice(graph.successors(start));
    }
    while let Some(node) = worklist.pop() {
        let Some(slot) = reached.get_mut(node.index()) else {
            continue;
        };
        if *slot {
            continue;
        }
        *slot = true;
        worklist.extend_from_slice(graph.successors(node));
    }
    reached
}

/// Returns true if there is a non-empty path from `from` to `to`.
pub fn has_path<G>(graph: &G, from: NodeId, to: NodeId) -> bool
where
    G: Successors,
{
    reachable_from(graph, [from])
        .get(to.index())
        .copied()
        .unwrap_or(false)
}
