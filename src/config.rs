//! Configuration for the horizontal class merger.
//!
//! [`MergerConfig`] controls which policies run, how aggressively visibility may be
//! widened, and carries the optional strategy hooks (merge key, target selection, policy
//! list rewriting) that callers and tests use to force specific groupings without any
//! global state.

use std::{fmt, sync::Arc};

use crate::{
    policy::{MergeGroup, Policy},
    program::{ClassDef, ClassId, HierarchyResolver, Program, Resolver, TypeName},
};

/// Name of the annotation that opts a class out of horizontal class merging.
pub const DEFAULT_OPT_OUT_ANNOTATION: &str = "classfold.annotations.NoHorizontalClassMerging";

/// Computes the equivalence key of a class; classes with different keys never merge.
pub type MergeKeyFn = Arc<dyn Fn(&Program, &ClassDef) -> String + Send + Sync>;

/// Chooses the target of a frozen group; `None` falls back to the default choice.
pub type TargetSelectorFn = Arc<dyn Fn(&Program, &MergeGroup) -> Option<ClassId> + Send + Sync>;

/// Rewrites the policy list before the pipeline runs.
pub type PolicyRewriterFn = Arc<dyn Fn(Vec<Box<dyn Policy>>) -> Vec<Box<dyn Policy>> + Send + Sync>;

/// Configuration for the horizontal class merger.
#[derive(Clone)]
pub struct MergerConfig {
    /// Run the merger at all (default: true).
    pub enabled: bool,

    /// Maximum number of classes in one merge group (default: 30).
    pub max_group_size: usize,

    /// Run the class-initializer deadlock detector (default: false).
    pub detect_class_initializer_deadlocks: bool,

    /// Allow widening package-private members so that package-bound classes can merge
    /// across packages, and merging methods of different visibility (default: false).
    pub allow_access_modification: bool,

    /// Only merge synthetic classes (default: false).
    pub restrict_to_synthetics: bool,

    /// Build merge plans on the rayon thread pool (default: true).
    pub parallel: bool,

    /// Log every policy rejection at info level (default: false).
    pub verbose: bool,

    /// Annotation that opts a class out of merging.
    pub opt_out_annotation: TypeName,

    /// Classes that must never be merged, in addition to annotated ones.
    pub no_merge_classes: Vec<TypeName>,

    /// Custom equivalence key for the initial grouping.
    pub merge_key: Option<MergeKeyFn>,

    /// Custom target selection.
    pub target_selector: Option<TargetSelectorFn>,

    /// Hook to replace or reorder the policy list.
    pub policy_rewriter: Option<PolicyRewriterFn>,

    /// Virtual dispatch resolution.
    pub resolver: Arc<dyn Resolver>,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_group_size: 30,
            detect_class_initializer_deadlocks: false,
            allow_access_modification: false,
            restrict_to_synthetics: false,
            parallel: true,
            verbose: false,
            opt_out_annotation: TypeName::new(DEFAULT_OPT_OUT_ANNOTATION),
            no_merge_classes: Vec::new(),
            merge_key: None,
            target_selector: None,
            policy_rewriter: None,
            resolver: Arc::new(HierarchyResolver),
        }
    }
}

impl fmt::Debug for MergerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergerConfig")
            .field("enabled", &self.enabled)
            .field("max_group_size", &self.max_group_size)
            .field(
                "detect_class_initializer_deadlocks",
                &self.detect_class_initializer_deadlocks,
            )
            .field("allow_access_modification", &self.allow_access_modification)
            .field("restrict_to_synthetics", &self.restrict_to_synthetics)
            .field("parallel", &self.parallel)
            .field("verbose", &self.verbose)
            .field("opt_out_annotation", &self.opt_out_annotation)
            .field("no_merge_classes", &self.no_merge_classes)
            .field("merge_key", &self.merge_key.is_some())
            .field("target_selector", &self.target_selector.is_some())
            .field("policy_rewriter", &self.policy_rewriter.is_some())
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl MergerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with every optional safety analysis enabled and no access widening.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            detect_class_initializer_deadlocks: true,
            allow_access_modification: false,
            ..Self::default()
        }
    }

    /// Configuration that only merges compiler-synthesized classes.
    #[must_use]
    pub fn synthetics_only() -> Self {
        Self {
            restrict_to_synthetics: true,
            ..Self::default()
        }
    }

    /// Configuration with merging turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the maximum group size.
    #[must_use]
    pub fn with_max_group_size(mut self, size: usize) -> Self {
        self.max_group_size = size;
        self
    }

    /// Enables or disables the class-initializer deadlock detector.
    #[must_use]
    pub fn with_deadlock_detection(mut self, enabled: bool) -> Self {
        self.detect_class_initializer_deadlocks = enabled;
        self
    }

    /// Enables or disables access modification.
    #[must_use]
    pub fn with_access_modification(mut self, enabled: bool) -> Self {
        self.allow_access_modification = enabled;
        self
    }

    /// Enables or disables parallel plan construction.
    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Enables or disables verbose rejection logging.
    #[must_use]
    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Installs a custom merge key.
    #[must_use]
    pub fn with_merge_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Program, &ClassDef) -> String + Send + Sync + 'static,
    {
        self.merge_key = Some(Arc::new(key));
        self
    }

    /// Installs a custom target selector.
    #[must_use]
    pub fn with_target_selector<F>(mut self, selector: F) -> Self
    where
        F: Fn(&Program, &MergeGroup) -> Option<ClassId> + Send + Sync + 'static,
    {
        self.target_selector = Some(Arc::new(selector));
        self
    }

    /// Installs a hook that rewrites the policy list.
    #[must_use]
    pub fn with_policy_rewriter<F>(mut self, rewriter: F) -> Self
    where
        F: Fn(Vec<Box<dyn Policy>>) -> Vec<Box<dyn Policy>> + Send + Sync + 'static,
    {
        self.policy_rewriter = Some(Arc::new(rewriter));
        self
    }

    /// Adds a class that must never be merged.
    #[must_use]
    pub fn with_no_merge_class(mut self, name: impl AsRef<str>) -> Self {
        self.no_merge_classes.push(TypeName::new(name));
        self
    }

    /// Replaces the resolution collaborator.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }
}
