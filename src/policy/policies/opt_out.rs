//! Classes that opted out of horizontal merging.

use crate::{
    policy::{reject_classes, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Rejects classes annotated with the configured opt-out annotation or listed in
/// [`crate::MergerConfig::no_merge_classes`].
///
/// Such a class can neither join a group nor become a target.
pub struct NoOptOutAnnotation;

impl Policy for NoOptOutAnnotation {
    fn name(&self) -> &'static str {
        "NoOptOutAnnotation"
    }

    fn description(&self) -> &'static str {
        "Excludes classes marked as not mergeable"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let annotation = &ctx.config.opt_out_annotation;
        Ok(reject_classes(self.name(), groups, ctx, |_, class| {
            if class.has_annotation(annotation) {
                Some(format!("annotated with @{annotation}"))
            } else if ctx.config.no_merge_classes.contains(&class.name) {
                Some("listed as not mergeable".to_string())
            } else {
                None
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::{Annotation, TypeName},
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder},
    };

    #[test]
    fn test_annotation_and_list() {
        let config = MergerConfig::default().with_no_merge_class("a.C");
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").build())
            .class(
                ClassBuilder::new("a.B")
                    .annotate(Annotation::marker(config.opt_out_annotation.clone()))
                    .build(),
            )
            .class(ClassBuilder::new("a.C").build())
            .class(ClassBuilder::new("a.D").build())
            .build();

        let (groups, log) = apply_policy(&program, &config, &NoOptOutAnnotation);
        assert_eq!(groups, vec![vec!["a.A", "a.D"]]);
        assert!(log.was_rejected(&TypeName::new("a.B"), "NoOptOutAnnotation"));
        assert!(log.was_rejected(&TypeName::new("a.C"), "NoOptOutAnnotation"));
    }
}
