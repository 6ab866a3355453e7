//! Same direct superclass.

use crate::{
    policy::{split_by_key, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Splits groups by direct superclass.
///
/// Besides keeping inherited behavior identical, this guarantees that no group member is
/// a subclass of another.
pub struct SameParentClass;

impl Policy for SameParentClass {
    fn name(&self) -> &'static str {
        "SameParentClass"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(split_by_key(self.name(), groups, ctx, |_, class| {
            class.super_type.clone()
        }))
    }
}
