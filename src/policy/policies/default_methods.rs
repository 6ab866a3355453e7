//! Default interface method collisions.
//!
//! The merged class implements the union of its members' interfaces. For a member `X`
//! that does not itself inherit a default method `m` that another member `Y` inherits,
//! merging hands `Y`'s default to every `X` instance. That is harmless unless
//!
//! - `X` declares `m` itself: the class method would now shadow `Y`'s default for the
//!   former `Y` instances, or
//! - `X` (or one of its subclasses) inherits a different default for `m`: the merged
//!   class, or the subclass, would see two maximally specific defaults and fail with
//!   an `IncompatibleClassChangeError`.
//!
//! Both cases are rejected rather than resolved with a dispatch bridge.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::{
    policy::{partition_greedily, MergeGroup, Policy, PolicyContext},
    program::{ClassId, MethodRef, MethodSig, Resolution, TypeName},
    Result,
};

type DefaultMethods = BTreeMap<MethodSig, BTreeSet<MethodRef>>;

#[derive(Default)]
struct DefaultInfo {
    /// Virtual signatures declared by the class itself
    declared: BTreeSet<MethodSig>,
    /// Default methods the class inherits
    inherited: DefaultMethods,
    /// Default methods the class or any of its subclasses inherits
    inherited_below: DefaultMethods,
}

/// Splits groups so that no member changes which default method it dispatches to.
pub struct NoDefaultInterfaceMethodCollisions;

impl NoDefaultInterfaceMethodCollisions {
    fn inherited_defaults(ctx: &PolicyContext<'_>, class: &TypeName) -> DefaultMethods {
        let mut result = DefaultMethods::new();
        let Some(id) = ctx.program.lookup(class) else {
            return result;
        };
        let mut signatures = BTreeSet::new();
        for interface in ctx.program.all_interfaces(id) {
            if let Some(def) = ctx.program.class_by_name(&interface) {
                signatures.extend(
                    def.methods
                        .iter()
                        .filter(|m| m.is_virtual() && !m.is_abstract())
                        .map(|m| m.sig.clone()),
                );
            }
        }
        for sig in signatures {
            let providers: BTreeSet<MethodRef> =
                match ctx.config.resolver.resolve_virtual(ctx.program, class, &sig) {
                    Resolution::Single(method) => std::iter::once(method).collect(),
                    Resolution::Ambiguous(methods) => methods.into_iter().collect(),
                    Resolution::NotFound => continue,
                };
            let from_interface = providers.iter().all(|m| {
                ctx.program
                    .class_by_name(&m.holder)
                    .is_some_and(|c| c.is_interface())
            });
            if from_interface {
                result.insert(sig, providers);
            }
        }
        result
    }

    fn info(ctx: &PolicyContext<'_>, id: ClassId) -> DefaultInfo {
        let Some(class) = ctx.program.class(id) else {
            return DefaultInfo::default();
        };
        let inherited = Self::inherited_defaults(ctx, &class.name);
        let mut inherited_below = inherited.clone();
        for subtype in ctx.subtypes.all_subtypes(&class.name) {
            for (sig, providers) in Self::inherited_defaults(ctx, &subtype) {
                inherited_below.entry(sig).or_default().extend(providers);
            }
        }
        DefaultInfo {
            declared: class
                .virtual_methods()
                .map(|m| m.sig.clone())
                .collect(),
            inherited,
            inherited_below,
        }
    }

    /// Returns true if `x` may receive the default methods `y` inherits.
    fn accepts(x: &DefaultInfo, y: &DefaultInfo) -> bool {
        y.inherited.iter().all(|(sig, providers)| {
            if x.declared.contains(sig) {
                return false;
            }
            x.inherited_below
                .get(sig)
                .map_or(true, |existing| existing == providers)
        })
    }
}

impl Policy for NoDefaultInterfaceMethodCollisions {
    fn name(&self) -> &'static str {
        "NoDefaultInterfaceMethodCollisions"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let mut infos: FxHashMap<ClassId, DefaultInfo> = FxHashMap::default();
        for group in &groups {
            for &id in group.classes() {
                infos.insert(id, Self::info(ctx, id));
            }
        }
        let empty = DefaultInfo::default();
        Ok(partition_greedily(self.name(), groups, ctx, |x, y| {
            let x = infos.get(&x).unwrap_or(&empty);
            let y = infos.get(&y).unwrap_or(&empty);
            Self::accepts(x, y) && Self::accepts(y, x)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::{Instruction, Proto},
        test::{
            apply_policy,
            builder::{print, ClassBuilder, ProgramBuilder},
        },
    };

    fn default_method(text: &str) -> Vec<Instruction> {
        let mut body = vec![];
        body.extend(print(text));
        body.push(Instruction::Return);
        body
    }

    #[test]
    fn test_different_defaults_collide() {
        let program = ProgramBuilder::new()
            .class(
                ClassBuilder::interface("a.J")
                    .virtual_method("m", Proto::void(vec![]), default_method("J"))
                    .build(),
            )
            .class(
                ClassBuilder::interface("a.K")
                    .virtual_method("m", Proto::void(vec![]), default_method("K"))
                    .build(),
            )
            .class(ClassBuilder::new("a.A").implements("a.J").build())
            .class(ClassBuilder::new("a.B").implements("a.K").build())
            .class(ClassBuilder::new("a.C").build())
            .build();

        let (groups, log) = apply_policy(
            &program,
            &MergerConfig::default(),
            &NoDefaultInterfaceMethodCollisions,
        );
        assert_eq!(groups, vec![vec!["a.A", "a.C"]]);
        assert!(log.was_rejected(
            &TypeName::new("a.B"),
            "NoDefaultInterfaceMethodCollisions"
        ));
    }

    #[test]
    fn test_class_method_shadowing_default() {
        let program = ProgramBuilder::new()
            .class(
                ClassBuilder::interface("a.J")
                    .virtual_method("m", Proto::void(vec![]), default_method("J"))
                    .build(),
            )
            .class(ClassBuilder::new("a.A").implements("a.J").build())
            .class(
                ClassBuilder::new("a.B")
                    .virtual_method("m", Proto::void(vec![]), default_method("B"))
                    .build(),
            )
            .build();

        let (groups, _) = apply_policy(
            &program,
            &MergerConfig::default(),
            &NoDefaultInterfaceMethodCollisions,
        );
        assert!(groups.is_empty());
    }

    #[test]
    fn test_same_default_is_fine() {
        let program = ProgramBuilder::new()
            .class(
                ClassBuilder::interface("a.J")
                    .virtual_method("m", Proto::void(vec![]), default_method("J"))
                    .build(),
            )
            .class(ClassBuilder::new("a.A").implements("a.J").build())
            .class(ClassBuilder::new("a.B").implements("a.J").build())
            .class(ClassBuilder::new("a.C").build())
            .build();

        let (groups, _) = apply_policy(
            &program,
            &MergerConfig::default(),
            &NoDefaultInterfaceMethodCollisions,
        );
        assert_eq!(groups, vec![vec!["a.A", "a.B", "a.C"]]);
    }
}
