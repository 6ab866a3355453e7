//! Shared test infrastructure.
//!
//! - [`builder`] - fluent builders for small programs
//! - [`interp`] - a tiny interpreter used to compare program output before and after merging
//! - `scenarios` - end-to-end merging scenarios

pub mod builder;
pub mod interp;

use crate::{
    config::MergerConfig,
    diagnostics::DiagnosticLog,
    policy::{MergeGroup, Policy, PolicyContext, PolicyScheduler},
    program::{Program, ReferenceIndex, SubtypeIndex},
    Result,
};

/// Runs `policy` alone over the initial candidate group of `program`.
///
/// Returns the surviving groups and the diagnostics recorded along the way.
pub fn try_apply_policy_groups(
    program: &Program,
    config: &MergerConfig,
    policy: &dyn Policy,
) -> Result<(Vec<MergeGroup>, DiagnosticLog)> {
    let references = ReferenceIndex::build(program);
    let subtypes = SubtypeIndex::build(program);
    let diagnostics = DiagnosticLog::new();
    let ctx = PolicyContext {
        program,
        config,
        references: &references,
        subtypes: &subtypes,
        diagnostics: &diagnostics,
    };
    let mut groups = policy.refine(PolicyScheduler::initial_groups(program), &ctx)?;
    groups.retain(|g| !g.is_trivial());
    Ok((groups, diagnostics))
}

/// Like [`try_apply_policy_groups`], but returns the groups as class names.
pub fn try_apply_policy(
    program: &Program,
    config: &MergerConfig,
    policy: &dyn Policy,
) -> Result<(Vec<Vec<String>>, DiagnosticLog)> {
    let (groups, diagnostics) = try_apply_policy_groups(program, config, policy)?;
    Ok((group_names(program, &groups), diagnostics))
}

/// Runs `policy` and returns the groups as class names, panicking on errors.
pub fn apply_policy(
    program: &Program,
    config: &MergerConfig,
    policy: &dyn Policy,
) -> (Vec<Vec<String>>, DiagnosticLog) {
    try_apply_policy(program, config, policy).unwrap()
}

/// Runs `policy` and returns the groups themselves, panicking on errors.
pub fn apply_policy_groups(
    program: &Program,
    config: &MergerConfig,
    policy: &dyn Policy,
) -> Vec<MergeGroup> {
    try_apply_policy_groups(program, config, policy).unwrap().0
}

/// Class names of every group, in group order.
pub fn group_names(program: &Program, groups: &[MergeGroup]) -> Vec<Vec<String>> {
    groups
        .iter()
        .map(|group| {
            group
                .classes()
                .iter()
                .filter_map(|id| program.class(*id))
                .map(|class| class.name.to_string())
                .collect()
        })
        .collect()
}
