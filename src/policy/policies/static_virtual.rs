//! Static and virtual methods with the same signature.

use crate::{
    policy::{partition_greedily, MergeGroup, Policy, PolicyContext},
    program::ClassDef,
    Result,
};

/// Splits groups in which a static method of one member has the signature of a virtual
/// method of another.
///
/// Renaming either method would be possible in principle, but a static method cannot
/// be bridged and renaming a virtual one changes overriding; such groups are split.
pub struct NoStaticVirtualCollisions;

impl NoStaticVirtualCollisions {
    fn collides(x: &ClassDef, y: &ClassDef) -> bool {
        x.methods
            .iter()
            .filter(|m| m.is_static() && !m.is_class_initializer())
            .any(|m| y.method(&m.sig).is_some_and(|other| other.is_virtual()))
    }
}

impl Policy for NoStaticVirtualCollisions {
    fn name(&self) -> &'static str {
        "NoStaticVirtualCollisions"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(partition_greedily(self.name(), groups, ctx, |x, y| {
            match (ctx.program.class(x), ctx.program.class(y)) {
                (Some(x), Some(y)) => !Self::collides(x, y) && !Self::collides(y, x),
                _ => false,
            }
        }))
    }
}
