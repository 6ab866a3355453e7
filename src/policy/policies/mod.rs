//! The policies of the grouping pipeline, one per file.
//!
//! Single-class policies reject individual classes; multi-class policies split groups.
//! See [`crate::policy::PolicyScheduler::from_config`] for the order in which they run.

mod abstract_classes;
mod clinit_side_effects;
mod default_methods;
mod direct_type_checks;
mod failed_resolution;
mod finalize;
mod group_size;
mod indirect_type_checks;
mod kept_classes;
mod merge_key;
mod method_characteristics;
mod native_methods;
mod nest_host;
mod opt_out;
mod package_boundaries;
mod parent_class;
mod partition;
mod pinned_members;
mod special_classes;
mod static_virtual;
mod synthetic_items;
mod synthetics;

pub use abstract_classes::CheckAbstractClasses;
pub use clinit_side_effects::NoClassInitializerWithObservableSideEffects;
pub use default_methods::NoDefaultInterfaceMethodCollisions;
pub use direct_type_checks::NoDirectRuntimeTypeChecks;
pub use failed_resolution::NoFailedResolutionTargets;
pub use finalize::FinalizeMergeGroup;
pub use group_size::LimitGroupSize;
pub use indirect_type_checks::NoIndirectRuntimeTypeChecks;
pub use kept_classes::NoKeptClasses;
pub use merge_key::SameMergeKey;
pub use method_characteristics::PreserveMethodCharacteristics;
pub use native_methods::NoNativeMethods;
pub use nest_host::SameNestHost;
pub use opt_out::NoOptOutAnnotation;
pub use package_boundaries::RespectPackageBoundaries;
pub use parent_class::SameParentClass;
pub use partition::SamePartition;
pub use pinned_members::PinnedMembers;
pub use special_classes::NoSpecialClasses;
pub use static_virtual::NoStaticVirtualCollisions;
pub use synthetic_items::SyntheticItems;
pub use synthetics::RestrictToSynthetics;
