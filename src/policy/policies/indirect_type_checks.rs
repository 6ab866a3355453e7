//! Interfaces observed by runtime type checks.

use std::collections::BTreeSet;

use crate::{
    policy::{split_by_key, MergeGroup, Policy, PolicyContext},
    program::TypeName,
    Result,
};

/// Splits groups so that, for every interface used in a runtime type check, the members
/// either all implement it or none does.
///
/// The merged class implements the union of its members' interfaces; without this split,
/// `x instanceof I` could start succeeding for instances that never implemented `I`.
pub struct NoIndirectRuntimeTypeChecks;

impl Policy for NoIndirectRuntimeTypeChecks {
    fn name(&self) -> &'static str {
        "NoIndirectRuntimeTypeChecks"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(split_by_key(self.name(), groups, ctx, |id, _| {
            ctx.program
                .all_interfaces(id)
                .into_iter()
                .filter(|i| ctx.references.is_type_checked(i))
                .collect::<BTreeSet<TypeName>>()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::{Instruction, TypeRef},
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder},
    };

    #[test]
    fn test_checked_interface_splits() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::interface("a.I").build())
            .class(ClassBuilder::interface("a.J").build())
            .class(ClassBuilder::new("a.A").implements("a.I").implements("a.J").build())
            .class(ClassBuilder::new("a.B").implements("a.J").build())
            .class(ClassBuilder::new("a.C").implements("a.I").build())
            .class(ClassBuilder::new("a.D").build())
            .class(
                ClassBuilder::new("a.Main")
                    .static_method(
                        "check",
                        vec![TypeRef::object()],
                        vec![
                            Instruction::Load(0),
                            Instruction::InstanceOf(TypeRef::class("a.I")),
                            Instruction::Pop,
                            Instruction::Return,
                        ],
                    )
                    .build(),
            )
            .build();

        let (groups, _) =
            apply_policy(&program, &MergerConfig::default(), &NoIndirectRuntimeTypeChecks);
        assert_eq!(groups, vec![vec!["a.A", "a.C"], vec!["a.B", "a.D", "a.Main"]]);
    }
}
