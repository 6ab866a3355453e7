//! Strongly connected components using Tarjan's algorithm.
//!
//! The class-initializer deadlock detector uses components to spot pre-existing
//! initialization cycles and to collapse them before reachability queries.

use crate::utils::graph::{NodeId, Successors};

/// Computes the strongly connected components of a directed graph.
///
/// # Arguments
///
/// * `graph` - The graph to analyze
///
/// # Returns
///
/// The components in reverse topological order: if an edge leads from component X to a
/// different component Y, Y appears before X.
///
/// # Complexity
///
/// O(V + E) time and space. The traversal uses an explicit stack, so deep graphs do not
/// overflow the call stack.
pub fn strongly_connected_components<G>(graph: &G) -> Vec<Vec<NodeId>>
where
    G: Successors,
{
    let count = graph.node_count();
    let mut index: Vec<Option<usize>> = vec![None; count];
    let mut lowlink = vec![0usize; count];
    let mut on_stack = vec![false; count];
    let mut stack: Vec<NodeId> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    for root in 0..count {
        if index[root].is_some() {
            continue;
        }

        // (node, position of the next successor to visit)
        let mut frames: Vec<(NodeId, usize)> = vec![(NodeId::new(root), 0)];
        index[root] = Some(next_index);
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(NodeId::new(root));
        on_stack[root] = true;

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            let successors = graph.successors(node);
            if let Some(&next) = successors.get(frame.1) {
                frame.1 += 1;
                match index[next.index()] {
                    None => {
                        index[next.index()] = Some(next_index);
                        lowlink[next.index()] = next_index;
                        next_index += 1;
                        stack.push(next);
                        on_stack[next.index()] = true;
                        frames.push((next, 0));
                    }
                    Some(next_index_value) if on_stack[next.index()] => {
                        lowlink[node.index()] = lowlink[node.index()].min(next_index_value);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent.index()] = lowlink[parent.index()].min(lowlink[node.index()]);
            }
            if Some(lowlink[node.index()]) == index[node.index()] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member.index()] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                component.sort();
                components.push(component);
            }
        }
    }

    components
}

/// Returns true if `node` lies on a cycle (a self loop counts).
pub fn is_on_cycle<G>(graph: &G, components: &[Vec<NodeId>], node: NodeId) -> bool
where
    G: Successors,
{
    components
        .iter()
        .find(|component| component.contains(&node))
        .is_some_and(|component| component.len() > 1 || graph.successors(node).contains(&node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::DirectedGraph;

    #[test]
    fn test_scc_empty_graph() {
        let graph: DirectedGraph<()> = DirectedGraph::new();
        assert!(strongly_connected_components(&graph).is_empty());
    }

    #[test]
    fn test_scc_simple_cycle() {
        let mut graph: DirectedGraph<char> = DirectedGraph::new();
        let a = graph.add_node('a');
        let b = graph.add_node('b');
        let c = graph.add_node('c');
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, c).unwrap();
        graph.add_edge(c, a).unwrap();

        let components = strongly_connected_components(&graph);
        assert_eq!(components, vec![vec![a, b, c]]);
        assert!(is_on_cycle(&graph, &components, b));
    }

    #[test]
    fn test_scc_reverse_topological_order() {
        let mut graph: DirectedGraph<char> = DirectedGraph::new();
        let a = graph.add_node('a');
        let b = graph.add_node('b');
        let c = graph.add_node('c');
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();
        graph.add_edge(b, c).unwrap();

        let components = strongly_connected_components(&graph);
        assert_eq!(components, vec![vec![c], vec![a, b]]);
        assert!(!is_on_cycle(&graph, &components, c));
    }

    #[test]
    fn test_scc_self_loop() {
        let mut graph: DirectedGraph<char> = DirectedGraph::new();
        let a = graph.add_node('a');
        graph.add_edge(a, a).unwrap();
        let components = strongly_connected_components(&graph);
        assert!(is_on_cycle(&graph, &components, a));
    }
}
