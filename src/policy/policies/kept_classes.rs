//! Classes pinned by keep rules or reflection.

use crate::{
    policy::{reject_classes, MergeGroup, Policy, PolicyContext},
    program::{Reference, ReferenceKind},
    Result,
};

/// Rejects classes whose name is an external contract: pinned by a keep rule, or named
/// by a tracked reflective identifier string.
pub struct NoKeptClasses;

impl Policy for NoKeptClasses {
    fn name(&self) -> &'static str {
        "NoKeptClasses"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(reject_classes(self.name(), groups, ctx, |_, class| {
            if class.pinned {
                return Some("pinned by a keep rule".to_string());
            }
            let reference = Reference::Type(class.name.clone());
            ctx.references
                .sites(&reference)
                .iter()
                .find(|site| site.kind == ReferenceKind::Identifier)
                .map(|site| format!("named reflectively in {}", site.method))
        }))
    }
}
