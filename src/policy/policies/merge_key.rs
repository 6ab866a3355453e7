//! Caller-supplied grouping key.

use crate::{
    policy::{split_by_key, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Splits groups by [`crate::MergerConfig::merge_key`]. Without a configured key, every
/// class has the same key and groups pass through unchanged.
pub struct SameMergeKey;

impl Policy for SameMergeKey {
    fn name(&self) -> &'static str {
        "SameMergeKey"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let Some(key) = &ctx.config.merge_key else {
            return Ok(groups);
        };
        Ok(split_by_key(self.name(), groups, ctx, |_, class| {
            key(ctx.program, class)
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
    fn test_custom_key() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A1").build())
            .class(ClassBuilder::new("a.B1").build())
            .class(ClassBuilder::new("a.A2").build())
            .class(ClassBuilder::new("a.B2").build())
            .build();
        let config = MergerConfig::default()
            .with_merge_key(|_, class| class.name.simple_name()[..1].to_string());

        let (groups, _) = apply_policy(&program, &config, &SameMergeKey);
        assert_eq!(groups, vec![vec!["a.A1", "a.A2"], vec!["a.B1", "a.B2"]]);

        let (unchanged, _) = apply_policy(&program, &MergerConfig::default(), &SameMergeKey);
        assert_eq!(unchanged.len(), 1);
    }
}
