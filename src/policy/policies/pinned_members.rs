//! Classes with pinned members.

use crate::{
    policy::{partition_greedily, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Allows at most one class with pinned members per group and makes it the target.
///
/// Pinned fields and methods keep their names and holder, so only the target can own them.
pub struct PinnedMembers;

impl Policy for PinnedMembers {
    fn name(&self) -> &'static str {
        "PinnedMembers"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let pinned = |id| {
            ctx.program
                .class(id)
                .is_some_and(crate::program::ClassDef::has_pinned_members)
        };
        let mut result = partition_greedily(self.name(), groups, ctx, |x, y| {
            !(pinned(x) && pinned(y))
        });
        for group in &mut result {
            if let Some(target) = group.classes().iter().copied().find(|c| pinned(*c)) {
                group.require_target(target);
            }
        }
        Ok(result)
    }
}
