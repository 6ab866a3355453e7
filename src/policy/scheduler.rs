//! Policy scheduling.
//!
//! [`PolicyScheduler`] assembles the ordered policy list from a [`MergerConfig`] and runs
//! it over the initial candidate group. Single-class policies run first; multi-class
//! policies follow; [`FinalizeMergeGroup`] always runs last so that every frozen group has
//! its target in front.

use crate::{
    config::MergerConfig,
    deadlock::NoClassInitializerCycles,
    policy::{
        policies::{
            CheckAbstractClasses, FinalizeMergeGroup, LimitGroupSize, NoClassInitializerWithObservableSideEffects,
            NoDefaultInterfaceMethodCollisions, NoDirectRuntimeTypeChecks, NoFailedResolutionTargets,
            NoIndirectRuntimeTypeChecks, NoKeptClasses, NoNativeMethods, NoOptOutAnnotation,
            NoSpecialClasses, NoStaticVirtualCollisions, PinnedMembers,
            PreserveMethodCharacteristics, RespectPackageBoundaries, RestrictToSynthetics,
            SameMergeKey, SameNestHost, SameParentClass, SamePartition, SyntheticItems,
        },
        MergeGroup, Policy, PolicyContext,
    },
    program::Program,
    Result,
};

/// Orchestrates the grouping pipeline.
pub struct PolicyScheduler {
    policies: Vec<Box<dyn Policy>>,
}

impl PolicyScheduler {
    /// Builds the policy list for `config`, then applies the configured rewriter.
    #[must_use]
    pub fn from_config(config: &MergerConfig) -> Self {
        let mut policies: Vec<Box<dyn Policy>> = vec![
            Box::new(NoOptOutAnnotation),
            Box::new(NoSpecialClasses),
        ];
        if config.restrict_to_synthetics {
            policies.push(Box::new(RestrictToSynthetics));
        }
        policies.extend([
            Box::new(NoKeptClasses) as Box<dyn Policy>,
            Box::new(NoNativeMethods),
            Box::new(NoDirectRuntimeTypeChecks),
            Box::new(NoClassInitializerWithObservableSideEffects),
            Box::new(NoFailedResolutionTargets),
            Box::new(SameMergeKey),
            Box::new(SameParentClass),
            Box::new(SamePartition),
            Box::new(SyntheticItems),
            Box::new(SameNestHost),
            Box::new(CheckAbstractClasses),
            Box::new(RespectPackageBoundaries),
            Box::new(NoIndirectRuntimeTypeChecks),
            Box::new(NoDefaultInterfaceMethodCollisions),
            Box::new(PreserveMethodCharacteristics),
            Box::new(NoStaticVirtualCollisions),
            Box::new(PinnedMembers),
        ]);
        if config.detect_class_initializer_deadlocks {
            policies.push(Box::new(NoClassInitializerCycles));
        }
        policies.push(Box::new(LimitGroupSize));
        policies.push(Box::new(FinalizeMergeGroup));

        if let Some(rewriter) = &config.policy_rewriter {
            policies = rewriter(policies);
        }
        PolicyScheduler { policies }
    }

    /// Uses exactly `policies`, in order.
    #[must_use]
    pub fn with_policies(policies: Vec<Box<dyn Policy>>) -> Self {
        PolicyScheduler { policies }
    }

    /// The scheduled policies.
    #[must_use]
    pub fn policies(&self) -> &[Box<dyn Policy>] {
        &self.policies
    }

    /// Names of the scheduled policies, in order.
    #[must_use]
    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    /// One group holding every program class that is not an interface, sorted by name.
    #[must_use]
    pub fn initial_groups(program: &Program) -> Vec<MergeGroup> {
        let mut candidates: Vec<_> = program
            .program_classes()
            .filter(|(_, class)| !class.is_interface())
            .map(|(id, class)| (class.name.clone(), id))
            .collect();
        candidates.sort();
        let group = MergeGroup::new(candidates.into_iter().map(|(_, id)| id).collect());
        if group.is_trivial() {
            Vec::new()
        } else {
            vec![group]
        }
    }

    /// Runs every policy over the initial groups.
    ///
    /// # Errors
    ///
    /// Propagates invariant violations raised by a policy.
    pub fn run(&self, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        let mut groups = Self::initial_groups(ctx.program);
        for policy in &self.policies {
            if groups.is_empty() {
                break;
            }
            let before: usize = groups.iter().map(MergeGroup::len).sum();
            groups = policy.refine(groups, ctx)?;
            groups.retain(|g| !g.is_trivial());
            let after: usize = groups.iter().map(MergeGroup::len).sum();
            log::debug!(
                "{}: {} groups, {} -> {} candidate classes",
                policy.name(),
                groups.len(),
                before,
                after
            );
        }
        Ok(groups)
    }
}
