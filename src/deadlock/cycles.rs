//! The deadlock-avoidance policy.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::{
    deadlock::InitializationTracer,
    policy::{partition_greedily, MergeGroup, Policy, PolicyContext},
    program::ClassId,
    utils::graph::{
        algorithms::{is_on_cycle, reachable_from, strongly_connected_components},
        DirectedGraph, NodeId,
    },
    Result,
};

/// Initialization dependencies between classes, with group coalescing applied.
///
/// Nodes are classes. An edge `A -> B` means that initializing `A` may start the
/// initialization of `B` while `A`'s lock is held. Triggering any member of a merge group
/// other than the one being analyzed is treated as triggering every member of that group,
/// since they will share one lock.
pub struct InitializationGraph {
    graph: DirectedGraph<ClassId>,
    nodes: FxHashMap<ClassId, NodeId>,
    untraceable: Vec<bool>,
    components: Vec<Vec<NodeId>>,
}

impl InitializationGraph {
    /// Builds the graph for every class reachable from the members of `groups`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if an edge refers to an unknown node.
    pub fn build(ctx: &PolicyContext<'_>, groups: &[MergeGroup]) -> Result<Self> {
        let tracer =
            InitializationTracer::new(ctx.program, ctx.config.resolver.as_ref(), ctx.subtypes);
        let mut group_of: FxHashMap<ClassId, usize> = FxHashMap::default();
        for (index, group) in groups.iter().enumerate() {
            for &class in group.classes() {
                group_of.insert(class, index);
            }
        }

        let mut this = InitializationGraph {
            graph: DirectedGraph::new(),
            nodes: FxHashMap::default(),
            untraceable: Vec::new(),
            components: Vec::new(),
        };
        let mut worklist: Vec<ClassId> = Vec::new();
        for group in groups {
            for &class in group.classes() {
                this.node_for(class, &mut worklist);
            }
        }

        while let Some(class) = worklist.pop() {
            let source = this.node_for(class, &mut worklist);
            let triggered = match tracer.direct_triggers(class) {
                Ok(triggered) => triggered,
                Err(reason) => {
                    log::debug!("class initializer of {class} is untraceable: {reason}");
                    this.untraceable[source.index()] = true;
                    continue;
                }
            };
            let own_group = group_of.get(&class).copied();
            let mut targets: BTreeSet<ClassId> = BTreeSet::new();
            for target in triggered {
                match group_of.get(&target) {
                    Some(&index) if Some(index) != own_group => {
                        targets.extend(groups[index].classes().iter().copied());
                    }
                    _ => {
                        targets.insert(target);
                    }
                }
            }
            for target in targets {
                let target = this.node_for(target, &mut worklist);
                this.graph.add_edge(source, target)?;
            }
        }

        this.components = strongly_connected_components(&this.graph);
        Ok(this)
    }

    fn node_for(&mut self, class: ClassId, worklist: &mut Vec<ClassId>) -> NodeId {
        if let Some(&node) = self.nodes.get(&class) {
            return node;
        }
        let node = self.graph.add_node(class);
        self.nodes.insert(class, node);
        self.untraceable.push(false);
        worklist.push(class);
        node
    }

    /// Classes reachable from `class` through at least one edge, and whether any of them
    /// (or `class` itself) could not be traced.
    #[must_use]
    pub fn reach(&self, class: ClassId) -> (BTreeSet<ClassId>, bool) {
        let Some(&node) = self.nodes.get(&class) else {
            return (BTreeSet::new(), false);
        };
        let reached = reachable_from(&self.graph, [node]);
        let mut classes = BTreeSet::new();
        let mut untraceable = self.untraceable[node.index()];
        for (index, hit) in reached.iter().enumerate() {
            if !hit {
                continue;
            }
            let id = NodeId::new(index);
            untraceable |= self.untraceable[index];
            if let Some(&reached_class) = self.graph.node(id) {
                classes.insert(reached_class);
            }
        }
        (classes, untraceable)
    }

    /// Returns true if initializing `class` can lead back to `class`.
    #[must_use]
    pub fn is_self_reaching(&self, class: ClassId) -> bool {
        self.nodes
            .get(&class)
            .is_some_and(|&node| is_on_cycle(&self.graph, &self.components, node))
    }
}

/// Splits groups whose merge could introduce a class-initialization deadlock.
///
/// A member is ineligible if its initializer cannot be traced or can reach itself. Two
/// members are incompatible if either's initializer can reach the other: after merging
/// they share one lock, and a second thread entering through an intermediate class would
/// wait on it while holding the intermediate class's lock.
pub struct NoClassInitializerCycles;

impl Policy for NoClassInitializerCycles {
    fn name(&self) -> &'static str {
        "NoClassInitializerCycles"
    }

    fn description(&self) -> &'static str {
        "Rejects merges that coalesce class-initialization locks into a cycle"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let graph = InitializationGraph::build(ctx, &groups)?;

        let mut reach: FxHashMap<ClassId, BTreeSet<ClassId>> = FxHashMap::default();
        let mut eligible_groups = Vec::with_capacity(groups.len());
        for mut group in groups {
            group.retain(|class| {
                let (reached, untraceable) = graph.reach(class);
                let reason = if untraceable {
                    Some("class initializer cannot be traced")
                } else if graph.is_self_reaching(class) {
                    Some("class initializer is on an initialization cycle")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    ctx.reject(self.name(), &[class], reason);
                    return false;
                }
                reach.insert(class, reached);
                true
            });
            if !group.is_trivial() {
                eligible_groups.push(group);
            }
        }

        Ok(partition_greedily(self.name(), eligible_groups, ctx, |x, y| {
            let x_reaches_y = reach.get(&x).is_some_and(|r| r.contains(&y));
            let y_reaches_x = reach.get(&y).is_some_and(|r| r.contains(&x));
            !x_reaches_y && !y_reaches_x
        }))
    }
}
