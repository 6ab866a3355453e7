//! Classes that are the static receiver of a failing method resolution.

use crate::{
    policy::{reject_classes, MergeGroup, Policy, PolicyContext},
    program::{InvokeKind, Reference, ReferenceKind, Resolution},
    Result,
};

/// Rejects classes through which some call site fails to resolve.
///
/// A failed resolution throws at runtime; merging could add the missing method to the
/// class or make the lookup ambiguous in a different way, changing which error is thrown.
pub struct NoFailedResolutionTargets;

impl Policy for NoFailedResolutionTargets {
    fn name(&self) -> &'static str {
        "NoFailedResolutionTargets"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(reject_classes(self.name(), groups, ctx, |_, class| {
            for reference in ctx.references.members_referenced_through(&class.name) {
                let Reference::Method(method) = reference else {
                    continue;
                };
                for site in ctx.references.sites(reference) {
                    let resolved = match site.kind {
                        ReferenceKind::Invoke(InvokeKind::Virtual | InvokeKind::Interface) => {
                            matches!(
                                ctx.config.resolver.resolve_virtual(
                                    ctx.program,
                                    &method.holder,
                                    &method.sig,
                                ),
                                Resolution::Single(_)
                            )
                        }
                        ReferenceKind::Invoke(_) => ctx.program.lookup_method(method).is_some(),
                        _ => true,
                    };
                    if !resolved {
                        return Some(format!("{method} fails to resolve in {}", site.method));
                    }
                }
            }
            None
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::{Instruction, MethodRef, Proto, TypeName},
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder},
    };

    #[test]
    fn test_missing_method_rejects_receiver() {
        let missing = MethodRef::new(TypeName::new("a.A"), "gone", Proto::void(vec![]));
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").default_constructor().build())
            .class(ClassBuilder::new("a.B").default_constructor().build())
            .class(
                ClassBuilder::new("a.C")
                    .static_method(
                        "run",
                        vec![],
                        vec![
                            Instruction::ConstNull,
                            Instruction::Invoke {
                                kind: InvokeKind::Virtual,
                                method: missing,
                            },
                            Instruction::Return,
                        ],
                    )
                    .build(),
            )
            .build();

        let (groups, log) =
            apply_policy(&program, &MergerConfig::default(), &NoFailedResolutionTargets);
        assert_eq!(groups, vec![vec!["a.B", "a.C"]]);
        assert!(log.was_rejected(&TypeName::new("a.A"), "NoFailedResolutionTargets"));
    }
}
