//! Enums, annotation types, records and interfaces.

use crate::{
    policy::{reject_classes, MergeGroup, Policy, PolicyContext},
    program::ClassAccessFlags,
    Result,
};

/// Rejects classes whose kind carries identity the runtime relies on.
pub struct NoSpecialClasses;

impl Policy for NoSpecialClasses {
    fn name(&self) -> &'static str {
        "NoSpecialClasses"
    }

    fn description(&self) -> &'static str {
        "Excludes interfaces, enums, annotation types and records"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(reject_classes(self.name(), groups, ctx, |_, class| {
            let kind = if class.flags.contains(ClassAccessFlags::ANNOTATION) {
                "is an annotation type"
            } else if class.is_interface() {
                "is an interface"
            } else if class.flags.contains(ClassAccessFlags::ENUM) {
                "is an enum"
            } else if class.flags.contains(ClassAccessFlags::RECORD) {
                "is a record"
            } else {
                return None;
            };
            Some(kind.to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::TypeName,
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder},
    };

    #[test]
    fn test_rejects_enums_and_records() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").build())
            .class(ClassBuilder::new("a.E").flags(ClassAccessFlags::ENUM).build())
            .class(ClassBuilder::new("a.R").flags(ClassAccessFlags::RECORD).build())
            .class(ClassBuilder::new("a.B").build())
            .build();

        let (groups, log) = apply_policy(&program, &MergerConfig::default(), &NoSpecialClasses);
        assert_eq!(groups, vec![vec!["a.A", "a.B"]]);
        let record = log.for_class(&TypeName::new("a.R")).next().map(|d| d.message.clone());
        assert_eq!(record.as_deref(), Some("is a record"));
        assert!(log.was_rejected(&TypeName::new("a.E"), "NoSpecialClasses"));
    }
}
