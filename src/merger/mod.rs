//! Horizontal class merging.
//!
//! This module drives the whole pass: it runs the policy pipeline, plans the merge of every
//! surviving group, commits the plans, fixes up signatures across the program and finally
//! rewrites every reference through the frozen [`RewriteLens`].
//!
//! # Architecture
//!
//! ```text
//!   PolicyScheduler ──► Vec<MergeGroup>
//!                            │  (rayon)
//!                            ▼
//!                     MergePlan::build ──► StructuralIncompatibility ──► diagnostic, group skipped
//!                            │
//!                     validate_access  ──► AccessViolation ──► diagnostic, group skipped
//!                            │
//!                     MergePlan::commit   (sequential, lens merge stage)
//!                            │
//!                     TreeFixer::run      (lens fix-up stage)
//!                            │
//!                     LensBuilder::freeze ──► CodeRewriter, annotations, resources, profile
//!                            │
//!                     verify_references
//! ```
//!
//! A plan only reads the program, so a failing plan never leaves a half-merged group
//! behind. Plans are committed in group order, which makes the result independent of the
//! number of worker threads.
//!
//! # Key Types
//!
//! - [`HorizontalClassMerger`] - entry point
//! - [`MergePlan`] - the merge of one group, computed but not yet applied
//! - [`MergeResult`] - the lens, the merged groups and every diagnostic
//!
//! # Examples
//!
//! ```rust,ignore
//! use classfold::{HorizontalClassMerger, MergerConfig};
//!
//! let result = HorizontalClassMerger::new(MergerConfig::default()).run(&mut program)?;
//! for merged in &result.merged {
//!     println!("{} <- {:?}", merged.target, merged.sources);
//! }
//! ```

mod class_initializer;
mod constructors;
mod direct_methods;
mod fields;
mod plan;
pub(crate) mod synthesize;
mod virtual_methods;

use std::collections::BTreeMap;

use rayon::prelude::*;

pub use plan::{MergePlan, CLASS_ID_FIELD};

use crate::{
    config::MergerConfig,
    diagnostics::{DiagnosticKind, DiagnosticLog},
    lens::{
        rewrite_annotations, rewrite_resources, rewrite_startup_profile, verify_references,
        CodeRewriter, LensBuilder, RewriteLens,
    },
    policy::{MergeGroup, PolicyContext, PolicyScheduler},
    program::{
        ClassAccessFlags, ClassDef, FieldRef, Program, ReferenceIndex, SubtypeIndex, TypeName,
    },
    tree_fixer::{validate_access, TreeFixer},
    Result,
};

/// Base name of the class whose `null` instances disambiguate constructors.
pub const CONSTRUCTOR_MARKER: &str = "classfold.internal.ConstructorMarker";

/// Name recorded as the policy of diagnostics raised while planning a merge.
const PLANNING: &str = "MergePlanning";

/// One merged group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedClass {
    /// The class that survived
    pub target: TypeName,
    /// The classes folded into it, in class id order
    pub sources: Vec<TypeName>,
    /// The class id field, if instances record which member they were created as
    pub class_id_field: Option<FieldRef>,
    /// Class id of every member, the target's being 0
    pub class_ids: BTreeMap<TypeName, i32>,
}

impl MergedClass {
    /// Class id of a member of this group.
    #[must_use]
    pub fn class_id_of(&self, name: &TypeName) -> Option<i32> {
        self.class_ids.get(name).copied()
    }
}

/// Everything a merge run produced besides the rewritten program.
#[derive(Debug)]
pub struct MergeResult {
    /// Rewrites every pre-merge reference to its final form
    pub lens: RewriteLens,
    /// Merged groups in commit order
    pub merged: Vec<MergedClass>,
    /// Policy rejections, abandoned groups and merge records
    pub diagnostics: DiagnosticLog,
}

impl MergeResult {
    fn unchanged(diagnostics: DiagnosticLog) -> Self {
        MergeResult {
            lens: RewriteLens::identity(),
            merged: Vec::new(),
            diagnostics,
        }
    }

    /// Number of classes that no longer exist.
    #[must_use]
    pub fn removed_class_count(&self) -> usize {
        self.merged.iter().map(|m| m.sources.len()).sum()
    }

    /// Returns true if nothing was merged.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.merged.is_empty()
    }

    /// The merged group that `name` ended up in, as target or source.
    #[must_use]
    pub fn group_of(&self, name: &TypeName) -> Option<&MergedClass> {
        self.merged.iter().find(|m| m.class_ids.contains_key(name))
    }
}

/// The horizontal class merging pass.
#[derive(Debug, Clone, Default)]
pub struct HorizontalClassMerger {
    config: MergerConfig,
}

impl HorizontalClassMerger {
    /// Creates a merger with the given configuration.
    #[must_use]
    pub fn new(config: MergerConfig) -> Self {
        HorizontalClassMerger { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &MergerConfig {
        &self.config
    }

    /// Merges classes of `program` in place.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingReference`] if a rewritten reference does not resolve,
    /// [`crate::Error::UnresolvableCollision`] if fixing signatures fails, or
    /// [`crate::Error::Invariant`] on internal inconsistencies. Groups that cannot be merged
    /// are not errors; they are recorded in [`MergeResult::diagnostics`].
    pub fn run(&self, program: &mut Program) -> Result<MergeResult> {
        let diagnostics = if self.config.verbose {
            DiagnosticLog::verbose()
        } else {
            DiagnosticLog::new()
        };
        if !self.config.enabled {
            log::debug!("horizontal class merging is disabled");
            return Ok(MergeResult::unchanged(diagnostics));
        }

        let groups = {
            let references = ReferenceIndex::build(program);
            let subtypes = SubtypeIndex::build(program);
            let ctx = PolicyContext {
                program: &*program,
                config: &self.config,
                references: &references,
                subtypes: &subtypes,
                diagnostics: &diagnostics,
            };
            PolicyScheduler::from_config(&self.config).run(&ctx)?
        };
        if groups.is_empty() {
            log::debug!("no merge groups survived the policies");
            return Ok(MergeResult::unchanged(diagnostics));
        }

        let marker = program.fresh_class_name(CONSTRUCTOR_MARKER);
        let plans = self.build_plans(program, &groups, &marker, &diagnostics)?;
        let plans = Self::check_access(program, plans, &diagnostics);

        let mut lens = LensBuilder::new();
        let mut uses_marker = false;
        let mut merged = Vec::with_capacity(plans.len());
        for plan in plans {
            uses_marker |= plan.uses_marker();
            let members: Vec<TypeName> = plan.member_names().cloned().collect();
            let group = plan.commit(program, &mut lens)?;
            diagnostics
                .record(DiagnosticKind::Merged)
                .classes(members)
                .message(format!("merged into {}", group.target));
            merged.push(group);
        }

        lens.begin_fixups();
        uses_marker |= TreeFixer::new(&mut lens, &marker).run(program)?;
        if uses_marker {
            let mut class = ClassDef::new(marker.as_str(), Some(TypeName::object()));
            class.flags = ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SYNTHETIC;
            class.synthetic = Some("constructor-marker".into());
            program.add_class(class)?;
        }

        let lens = lens.freeze();
        CodeRewriter::new(&lens).apply(program);
        rewrite_annotations(program, &lens);
        rewrite_resources(program, &lens);
        rewrite_startup_profile(program, &lens);
        verify_references(program, &lens)?;

        for group in &mut merged {
            group.class_id_field = group.class_id_field.as_ref().map(|f| lens.rewrite_field(f));
        }
        let result = MergeResult {
            lens,
            merged,
            diagnostics,
        };
        log::info!(
            "horizontal class merging removed {} classes in {} groups",
            result.removed_class_count(),
            result.merged.len()
        );
        Ok(result)
    }

    fn build_plans(
        &self,
        program: &Program,
        groups: &[MergeGroup],
        marker: &TypeName,
        diagnostics: &DiagnosticLog,
    ) -> Result<Vec<MergePlan>> {
        let config = &self.config;
        let built: Vec<Result<MergePlan>> = if config.parallel {
            groups
                .par_iter()
                .map(|group| MergePlan::build(program, group, config, marker))
                .collect()
        } else {
            groups
                .iter()
                .map(|group| MergePlan::build(program, group, config, marker))
                .collect()
        };

        let mut plans = Vec::with_capacity(built.len());
        for (group, plan) in groups.iter().zip(built) {
            match plan {
                Ok(plan) => plans.push(plan),
                Err(error) if error.is_recoverable() => {
                    log::warn!("not merging {}: {error}", group.describe(program));
                    diagnostics
                        .record(DiagnosticKind::StructuralIncompatibility)
                        .policy(PLANNING)
                        .classes(group.classes().iter().filter_map(|c| program.class(*c)).map(|c| c.name.clone()))
                        .message(error.to_string());
                }
                Err(error) => return Err(error),
            }
        }
        Ok(plans)
    }

    fn check_access(program: &Program, plans: Vec<MergePlan>, diagnostics: &DiagnosticLog) -> Vec<MergePlan> {
        let subtypes = SubtypeIndex::build(program);
        plans
            .into_iter()
            .filter(|plan| match validate_access(program, &subtypes, plan) {
                Ok(()) => true,
                Err(message) => {
                    log::warn!("not merging into {}: {message}", plan.merged().name);
                    diagnostics
                        .record(DiagnosticKind::AccessViolation)
                        .policy("AccessValidation")
                        .classes(plan.member_names().cloned())
                        .message(message);
                    false
                }
            })
            .collect()
    }
}
