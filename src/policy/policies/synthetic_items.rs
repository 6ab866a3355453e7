//! Synthetic kinds.

use crate::{
    policy::{split_by_key, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Splits groups so that synthetic classes only merge with synthetic classes of the same
/// kind, and ordinary classes only with ordinary classes.
pub struct SyntheticItems;

impl Policy for SyntheticItems {
    fn name(&self) -> &'static str {
        "SyntheticItems"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(split_by_key(self.name(), groups, ctx, |_, class| {
            class.synthetic.clone()
        }))
    }
}
