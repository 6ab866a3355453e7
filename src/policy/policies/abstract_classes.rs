//! Abstract and concrete classes.

use crate::{
    policy::{split_by_key, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Splits abstract classes from concrete ones.
///
/// A merged class is either abstract or not; merging an abstract class into a concrete
/// one would make it instantiable, and the reverse would break allocations.
pub struct CheckAbstractClasses;

impl Policy for CheckAbstractClasses {
    fn name(&self) -> &'static str {
        "CheckAbstractClasses"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(split_by_key(self.name(), groups, ctx, |_, class| {
            class.is_abstract()
        }))
    }
}
