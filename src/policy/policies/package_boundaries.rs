//! Package-private access across packages.

use std::collections::BTreeSet;

use crate::{
    policy::{split_by_key, MergeGroup, Policy, PolicyContext},
    program::{ClassAccessFlags, ClassDef, Instruction, MethodDef, Reference, TypeName, Visibility},
    Result,
};

/// Keeps package-bound classes inside their package.
///
/// A class is package bound when moving its members into a class of another package would
/// break an access check: it is not public, declares package-private or protected members,
/// or its code accesses non-public classes and members of its own package. Bound classes
/// only merge with classes of the same package; classes that are not bound may join any
/// group, and prefer the group of their own package when one exists.
///
/// With [`crate::MergerConfig::allow_access_modification`] the class's own non-virtual
/// members and the class itself may be made public by the merger, so they no longer bind.
/// Package-private virtual methods always bind, since widening them would change which
/// methods they override.
pub struct RespectPackageBoundaries;

impl RespectPackageBoundaries {
    /// Returns why `class` must stay in its package, or `None`.
    pub(crate) fn binding_reason(ctx: &PolicyContext<'_>, class: &ClassDef) -> Option<String> {
        let widen = ctx.config.allow_access_modification;
        if !widen && !class.flags.contains(ClassAccessFlags::PUBLIC) {
            return Some("class is not public".to_string());
        }
        for field in &class.fields {
            let visibility = field.flags.visibility();
            if !widen && matches!(visibility, Visibility::PackagePrivate | Visibility::Protected) {
                return Some(format!("declares non-public field {}", field.name));
            }
        }
        for method in &class.methods {
            if method.is_class_initializer() {
                continue;
            }
            let visibility = method.visibility();
            let bound_visibility =
                matches!(visibility, Visibility::PackagePrivate | Visibility::Protected);
            if bound_visibility && (!widen || method.is_virtual()) {
                return Some(format!("declares non-public method {}", method.sig));
            }
        }
        for method in &class.methods {
            if let Some(reason) = Self::package_access(ctx, class, method) {
                return Some(reason);
            }
        }
        None
    }

    fn package_access(ctx: &PolicyContext<'_>, class: &ClassDef, method: &MethodDef) -> Option<String> {
        let code = method.code.as_ref()?;
        let program = ctx.program;
        let same_package_other = |holder: &TypeName| {
            holder != &class.name && holder.same_package(&class.name) && program.is_program_class(holder)
        };
        for insn in &code.instructions {
            let reference = match insn {
                Instruction::NewInstance(ty) => Reference::Type(ty.clone()),
                Instruction::CheckCast(ty) | Instruction::InstanceOf(ty) | Instruction::ConstClass(ty) => {
                    match ty.base_class() {
                        Some(name) => Reference::Type(name.clone()),
                        None => continue,
                    }
                }
                Instruction::Invoke { method, .. } => Reference::Method(method.clone()),
                Instruction::GetField(field)
                | Instruction::PutField(field)
                | Instruction::GetStatic(field)
                | Instruction::PutStatic(field) => Reference::Field(field.clone()),
                _ => continue,
            };
            if !same_package_other(reference.holder()) {
                continue;
            }
            let holder_public = program
                .class_by_name(reference.holder())
                .is_some_and(|c| c.flags.contains(ClassAccessFlags::PUBLIC));
            let member_public = match &reference {
                Reference::Type(_) => true,
                Reference::Method(target) => program
                    .lookup_method(target)
                    .map_or(true, |(_, m)| m.visibility() == Visibility::Public),
                Reference::Field(target) => program
                    .resolve_field(target)
                    .map_or(true, |(_, f)| f.flags.visibility() == Visibility::Public),
            };
            if !holder_public || !member_public {
                return Some(format!("accesses non-public {reference}"));
            }
        }
        None
    }
}

impl Policy for RespectPackageBoundaries {
    fn name(&self) -> &'static str {
        "RespectPackageBoundaries"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let mut result = Vec::new();
        for group in groups {
            let bound: BTreeSet<_> = group
                .classes()
                .iter()
                .filter_map(|id| ctx.program.class(*id))
                .filter(|class| {
                    let reason = Self::binding_reason(ctx, class);
                    if let Some(reason) = &reason {
                        log::debug!("{} is package bound: {reason}", class.name);
                    }
                    reason.is_some()
                })
                .map(|class| class.name.package().to_string())
                .collect();
            result.extend(split_by_key(self.name(), vec![group], ctx, |_, class| {
                let package = class.name.package();
                bound.contains(package).then(|| package.to_string())
            }));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::{FieldAccessFlags, TypeRef},
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder},
    };

    fn program() -> crate::program::Program {
        ProgramBuilder::new()
            .class(
                ClassBuilder::new("a.A")
                    .field("x", TypeRef::Int, FieldAccessFlags::empty())
                    .build(),
            )
            .class(ClassBuilder::new("a.B").build())
            .class(ClassBuilder::new("b.C").build())
            .class(
                ClassBuilder::new("b.D")
                    .field("y", TypeRef::Int, FieldAccessFlags::empty())
                    .build(),
            )
            .class(ClassBuilder::new("c.E").build())
            .build()
    }

    #[test]
    fn test_bound_classes_stay_in_package() {
        let (groups, _) =
            apply_policy(&program(), &MergerConfig::default(), &RespectPackageBoundaries);
        assert_eq!(groups, vec![vec!["a.A", "a.B"], vec!["b.C", "b.D"]]);
    }

    #[test]
    fn test_access_modification_unbinds_fields() {
        let config = MergerConfig::default().with_access_modification(true);
        let (groups, _) = apply_policy(&program(), &config, &RespectPackageBoundaries);
        assert_eq!(groups, vec![vec!["a.A", "a.B", "b.C", "b.D", "c.E"]]);
    }
}
