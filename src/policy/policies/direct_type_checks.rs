//! Classes observed by runtime type checks.

use crate::{
    policy::{reject_classes, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Rejects classes used by `instanceof`, `checkcast`, `const-class` or as a catch type.
///
/// After merging, such a check would also accept instances of the other group members.
pub struct NoDirectRuntimeTypeChecks;

impl Policy for NoDirectRuntimeTypeChecks {
    fn name(&self) -> &'static str {
        "NoDirectRuntimeTypeChecks"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(reject_classes(self.name(), groups, ctx, |_, class| {
            ctx.references
                .runtime_type_checks(&class.name)
                .first()
                .map(|site| format!("{} in {}", site.kind, site.method))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::{Instruction, TypeName, TypeRef},
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder},
    };

    #[test]
    fn test_instance_of_rejects() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").build())
            .class(ClassBuilder::new("a.B").build())
            .class(
                ClassBuilder::new("a.C")
                    .static_method(
                        "check",
                        vec![TypeRef::object()],
                        vec![
                            Instruction::Load(0),
                            Instruction::InstanceOf(TypeRef::class("a.A")),
                            Instruction::Pop,
                            Instruction::Return,
                        ],
                    )
                    .build(),
            )
            .build();

        let (groups, log) =
            apply_policy(&program, &MergerConfig::default(), &NoDirectRuntimeTypeChecks);
        assert_eq!(groups, vec![vec!["a.B", "a.C"]]);
        let message = log
            .for_class(&TypeName::new("a.A"))
            .next()
            .map(|d| d.message.clone())
            .unwrap_or_default();
        assert!(message.starts_with("InstanceOf in a.C.check"));
    }
}
