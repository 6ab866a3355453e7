//! Output artifact partitioning.

use crate::{
    policy::{split_by_key, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Splits groups by placement: dex file, feature split, main-dex membership and startup
/// membership must all agree.
pub struct SamePartition;

impl Policy for SamePartition {
    fn name(&self) -> &'static str {
        "SamePartition"
    }

    fn description(&self) -> &'static str {
        "Keeps merged classes inside one dex file, feature split and main-dex list"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(split_by_key(self.name(), groups, ctx, |_, class| {
            class.placement.clone()
        }))
    }
}
