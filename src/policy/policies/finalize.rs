//! Target selection.

use crate::{
    policy::{MergeGroup, Policy, PolicyContext},
    program::{ClassId, Program},
    Result,
};

/// Freezes every group: checks the group invariants, chooses the target and moves it to
/// the front.
///
/// The target is, in order of preference, the class demanded by an earlier policy, the
/// class returned by [`crate::MergerConfig::target_selector`], or the member with the
/// fewest constructors (earliest in group order on ties), which minimizes the number of
/// dispatching constructors that have to be synthesized.
pub struct FinalizeMergeGroup;

impl FinalizeMergeGroup {
    fn default_target(program: &Program, group: &MergeGroup) -> Option<ClassId> {
        group
            .classes()
            .iter()
            .copied()
            .min_by_key(|id| program.class(*id).map_or(usize::MAX, |c| c.constructors().count()))
    }
}

impl Policy for FinalizeMergeGroup {
    fn name(&self) -> &'static str {
        "FinalizeMergeGroup"
    }

    fn refine(&self, mut groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let program = ctx.program;
        for group in &mut groups {
            for (index, &x) in group.classes().iter().enumerate() {
                for &y in &group.classes()[index + 1..] {
                    let (Some(a), Some(b)) = (program.class(x), program.class(y)) else {
                        return Err(invariant_error!("merge group refers to a removed class"));
                    };
                    if program.is_subtype(&a.name, &b.name) || program.is_subtype(&b.name, &a.name) {
                        return Err(invariant_error!(
                            "{} and {} are related by inheritance but share a merge group",
                            a.name,
                            b.name
                        ));
                    }
                }
            }

            let selected = group
                .required_target()
                .or_else(|| {
                    ctx.config
                        .target_selector
                        .as_ref()
                        .and_then(|select| select(program, group))
                        .filter(|id| group.contains(*id))
                })
                .or_else(|| Self::default_target(program, group));
            let Some(target) = selected else {
                return Err(invariant_error!("empty merge group"));
            };
            group.set_target(target);
            log::debug!("merge group {} frozen", group.describe(program));
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::TypeRef,
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder, try_apply_policy},
        Error,
    };

    fn program() -> Program {
        ProgramBuilder::new()
            .class(
                ClassBuilder::new("a.A")
                    .default_constructor()
                    .constructor(vec![TypeRef::Int], vec![])
                    .build(),
            )
            .class(ClassBuilder::new("a.B").default_constructor().build())
            .class(ClassBuilder::new("a.C").default_constructor().build())
            .build()
    }

    #[test]
    fn test_fewest_constructors_wins() {
        let (groups, _) = apply_policy(&program(), &MergerConfig::default(), &FinalizeMergeGroup);
        assert_eq!(groups, vec![vec!["a.B", "a.A", "a.C"]]);
    }

    #[test]
    fn test_target_selector() {
        let config = MergerConfig::default().with_target_selector(|program, group| {
            group
                .classes()
                .iter()
                .copied()
                .find(|id| program.class(*id).is_some_and(|c| c.name.as_str() == "a.C"))
        });
        let (groups, _) = apply_policy(&program(), &config, &FinalizeMergeGroup);
        assert_eq!(groups, vec![vec!["a.C", "a.A", "a.B"]]);
    }

    #[test]
    fn test_inheritance_inside_group_is_invariant_violation() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").build())
            .class(ClassBuilder::new("a.B").extends("a.A").build())
            .build();
        let result = try_apply_policy(&program, &MergerConfig::default(), &FinalizeMergeGroup);
        assert!(matches!(result, Err(Error::Invariant { .. })));
    }
}
