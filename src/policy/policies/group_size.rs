//! Group size limit.

use crate::{
    policy::{MergeGroup, Policy, PolicyContext},
    Result,
};

/// Cuts groups into chunks of at most [`crate::MergerConfig::max_group_size`] classes.
pub struct LimitGroupSize;

impl Policy for LimitGroupSize {
    fn name(&self) -> &'static str {
        "LimitGroupSize"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let limit = ctx.config.max_group_size.max(2);
        let mut result = Vec::with_capacity(groups.len());
        for group in groups {
            if group.len() <= limit {
                result.push(group);
                continue;
            }
            for chunk in group.classes().chunks(limit) {
                if chunk.len() < 2 {
                    ctx.reject(self.name(), chunk, format!("group exceeds {limit} classes"));
                    continue;
                }
                result.push(group.subgroup(chunk.to_vec()));
            }
        }
        Ok(result)
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
    fn test_chunks() {
        let mut builder = ProgramBuilder::new();
        for name in ["a.A", "a.B", "a.C", "a.D", "a.E"] {
            builder = builder.class(ClassBuilder::new(name).build());
        }
        let program = builder.build();
        let config = MergerConfig::default().with_max_group_size(2);

        let (groups, log) = apply_policy(&program, &config, &LimitGroupSize);
        assert_eq!(groups, vec![vec!["a.A", "a.B"], vec!["a.C", "a.D"]]);
        assert!(log.was_rejected(&TypeName::new("a.E"), "LimitGroupSize"));
    }
}
