//! Restriction to compiler-synthesized classes.

use crate::{
    policy::{reject_classes, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Rejects every class that is not synthetic. Only scheduled when
/// [`crate::MergerConfig::restrict_to_synthetics`] is set.
pub struct RestrictToSynthetics;

impl Policy for RestrictToSynthetics {
    fn name(&self) -> &'static str {
        "RestrictToSynthetics"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(reject_classes(self.name(), groups, ctx, |_, class| {
            class
                .synthetic
                .is_none()
                .then(|| "not a synthetic class".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder},
    };

    #[test]
    fn test_keeps_synthetics() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").build())
            .class(ClassBuilder::new("a.A$$Lambda$1").synthetic("lambda").build())
            .class(ClassBuilder::new("a.A$$Lambda$2").synthetic("lambda").build())
            .build();
        let (groups, _) =
            apply_policy(&program, &MergerConfig::synthetics_only(), &RestrictToSynthetics);
        assert_eq!(groups, vec![vec!["a.A$$Lambda$1", "a.A$$Lambda$2"]]);
    }
}
