//! Nest membership.

use crate::{
    policy::{split_by_key, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Splits groups by nest host.
///
/// Private access between nest mates is checked against the nest host, so a merged class
/// must stay in the nest of every member. A host is its own nest host; classes outside
/// any nest share the empty key.
pub struct SameNestHost;

impl Policy for SameNestHost {
    fn name(&self) -> &'static str {
        "SameNestHost"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(split_by_key(self.name(), groups, ctx, |_, class| {
            match &class.nest_host {
                Some(host) => Some(host.clone()),
                None if !class.nest_members.is_empty() => Some(class.name.clone()),
                None => None,
            }
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
    fn test_host_groups_with_members() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.Host").nest_members(&["a.Host$A", "a.Host$B"]).build())
            .class(ClassBuilder::new("a.Host$A").nest_host("a.Host").build())
            .class(ClassBuilder::new("a.Host$B").nest_host("a.Host").build())
            .class(ClassBuilder::new("a.X").build())
            .class(ClassBuilder::new("a.Y").build())
            .build();

        let (groups, _) = apply_policy(&program, &MergerConfig::default(), &SameNestHost);
        assert_eq!(
            groups,
            vec![vec!["a.Host", "a.Host$A", "a.Host$B"], vec!["a.X", "a.Y"]]
        );
    }
}
