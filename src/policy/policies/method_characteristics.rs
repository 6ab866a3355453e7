//! Virtual method characteristics.

use crate::{
    policy::{partition_greedily, MergeGroup, Policy, PolicyContext},
    program::{ClassDef, ClassId},
    Result,
};

/// Splits groups so that virtual methods sharing a signature can be bridged without
/// changing their modifiers.
///
/// Methods with the same signature in two members must agree on `synchronized`, and on
/// visibility unless access modification is allowed. `final` never conflicts: the bridge
/// is only final when every member's method is.
pub struct PreserveMethodCharacteristics;

impl PreserveMethodCharacteristics {
    fn compatible(x: &ClassDef, y: &ClassDef, widen: bool) -> bool {
        x.virtual_methods().all(|mx| {
            let Some(my) = y.method(&mx.sig).filter(|m| m.is_virtual()) else {
                return true;
            };
            mx.is_synchronized() == my.is_synchronized()
                && (widen || mx.visibility() == my.visibility())
        })
    }
}

impl Policy for PreserveMethodCharacteristics {
    fn name(&self) -> &'static str {
        "PreserveMethodCharacteristics"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let widen = ctx.config.allow_access_modification;
        Ok(partition_greedily(self.name(), groups, ctx, |x: ClassId, y: ClassId| {
            match (ctx.program.class(x), ctx.program.class(y)) {
                (Some(x), Some(y)) => Self::compatible(x, y, widen),
                _ => false,
            }
        }))
    }
}
