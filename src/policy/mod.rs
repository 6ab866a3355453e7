//! Candidate grouping.
//!
//! The grouper starts from one group holding every candidate class and runs an ordered
//! list of [`Policy`] values over it. Each policy refines the current groups: it may reject
//! individual classes, split a group into smaller groups, or drop a group entirely. Groups
//! that become trivial (fewer than two classes) are dropped after every policy.
//!
//! # Architecture
//!
//! ```text
//!   PolicyScheduler::initial_groups
//!            │
//!            ▼
//!   ┌─────────────────┐    single-class policies   (reject one class at a time)
//!   │ Vec<MergeGroup> │──► multi-class policies    (split by key / greedy partition)
//!   └─────────────────┘──► FinalizeMergeGroup      (choose target, move it first)
//! ```
//!
//! Every rejection is recorded in the [`DiagnosticLog`] under the policy's name. The same
//! program and the same policy list always produce the same groups: policies only ever
//! iterate groups and classes in order, and splitting keeps first-appearance order.
//!
//! # Key Types
//!
//! - [`Policy`] - one refinement step
//! - [`PolicyContext`] - the immutable inputs every policy reads
//! - [`MergeGroup`] - an ordered candidate set
//! - [`PolicyScheduler`] - builds and runs the policy list

mod group;
pub mod policies;
mod scheduler;

use std::collections::BTreeMap;

pub use group::MergeGroup;
pub use scheduler::PolicyScheduler;

use crate::{
    config::MergerConfig,
    diagnostics::{DiagnosticKind, DiagnosticLog},
    program::{ClassDef, ClassId, Program, ReferenceIndex, SubtypeIndex},
    Result,
};

/// Read-only inputs shared by all policies.
pub struct PolicyContext<'a> {
    /// The program before merging
    pub program: &'a Program,
    /// Merger configuration
    pub config: &'a MergerConfig,
    /// Reverse reference index of `program`
    pub references: &'a ReferenceIndex,
    /// Inverse supertype relation of `program`
    pub subtypes: &'a SubtypeIndex,
    /// Where rejections are recorded
    pub diagnostics: &'a DiagnosticLog,
}

impl PolicyContext<'_> {
    /// Records that `classes` were rejected by `policy`.
    pub fn reject(&self, policy: &'static str, classes: &[ClassId], message: impl Into<String>) {
        let names = classes
            .iter()
            .filter_map(|c| self.program.class(*c))
            .map(|c| c.name.clone());
        self.diagnostics
            .record(DiagnosticKind::PolicyRejection)
            .policy(policy)
            .classes(names)
            .message(message);
    }
}

/// A single refinement step of the grouping pipeline.
///
/// Policies must be deterministic and must preserve the relative order of the classes
/// they keep.
pub trait Policy: Send + Sync {
    /// Unique name, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Short description of the criterion.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Refines `groups`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if a group violates an invariant that earlier
    /// policies should have established.
    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>>;
}

/// Removes every class for which `reason` returns a rejection message.
///
/// Building block of single-class policies. Rejected classes are recorded one diagnostic
/// per class; groups that become trivial are dropped.
pub fn reject_classes<F>(
    policy: &'static str,
    groups: Vec<MergeGroup>,
    ctx: &PolicyContext<'_>,
    mut reason: F,
) -> Vec<MergeGroup>
where
    F: FnMut(ClassId, &ClassDef) -> Option<String>,
{
    let mut result = Vec::with_capacity(groups.len());
    for mut group in groups {
        group.retain(|id| {
            let Some(class) = ctx.program.class(id) else {
                return false;
            };
            match reason(id, class) {
                Some(message) => {
                    ctx.reject(policy, &[id], message);
                    false
                }
                None => true,
            }
        });
        if !group.is_trivial() {
            result.push(group);
        }
    }
    result
}

/// Splits every group by `key`, keeping first-appearance order of the keys.
///
/// Building block of multi-class policies. Classes that end up alone are recorded as
/// rejected by `policy`.
pub fn split_by_key<K, F>(
    policy: &'static str,
    groups: Vec<MergeGroup>,
    ctx: &PolicyContext<'_>,
    mut key: F,
) -> Vec<MergeGroup>
where
    K: Ord,
    F: FnMut(ClassId, &ClassDef) -> K,
{
    let mut result = Vec::new();
    for group in groups {
        let mut order: Vec<Vec<ClassId>> = Vec::new();
        let mut slots: BTreeMap<K, usize> = BTreeMap::new();
        for &id in group.classes() {
            let Some(class) = ctx.program.class(id) else {
                continue;
            };
            let slot = *slots.entry(key(id, class)).or_insert_with(|| {
                order.push(Vec::new());
                order.len() - 1
            });
            order[slot].push(id);
        }
        finish_split(policy, &group, order, ctx, &mut result);
    }
    result
}

/// Partitions every group greedily: each class joins the first sub-group in which it is
/// compatible with every member, or starts a new one.
///
/// `compatible` must be symmetric. Classes that end up alone are recorded as rejected.
pub fn partition_greedily<F>(
    policy: &'static str,
    groups: Vec<MergeGroup>,
    ctx: &PolicyContext<'_>,
    mut compatible: F,
) -> Vec<MergeGroup>
where
    F: FnMut(ClassId, ClassId) -> bool,
{
    let mut result = Vec::new();
    for group in groups {
        let mut parts: Vec<Vec<ClassId>> = Vec::new();
        for &id in group.classes() {
            match parts
                .iter_mut()
                .find(|part| part.iter().all(|&other| compatible(other, id)))
            {
                Some(part) => part.push(id),
                None => parts.push(vec![id]),
            }
        }
        finish_split(policy, &group, parts, ctx, &mut result);
    }
    result
}

fn finish_split(
    policy: &'static str,
    group: &MergeGroup,
    parts: Vec<Vec<ClassId>>,
    ctx: &PolicyContext<'_>,
    result: &mut Vec<MergeGroup>,
) {
    if parts.len() == 1 && parts[0].len() == group.len() {
        result.push(group.clone());
        return;
    }
    for part in parts {
        if part.len() < 2 {
            ctx.reject(policy, &part, "no compatible merge partner");
            continue;
        }
        result.push(group.subgroup(part));
    }
}
