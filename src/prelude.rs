//! # classfold Prelude
//!
//! The types needed to build a program, run the merger and inspect the outcome.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classfold operations
pub use crate::Error;

/// The result type used throughout classfold
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The driver and its outcome
pub use crate::merger::{HorizontalClassMerger, MergeResult, MergedClass};

/// Configuration and its presets
pub use crate::config::MergerConfig;

// ================================================================================================
// Program Model
// ================================================================================================

/// The arena and its definitions
pub use crate::program::{ClassDef, ClassId, FieldDef, MethodDef, Program};

/// Names, types and member references
pub use crate::program::{FieldRef, MethodRef, MethodSig, Proto, Reference, TypeName, TypeRef};

/// Method bodies
pub use crate::program::{Code, Instruction, InvokeKind};

/// Access flags
pub use crate::program::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, Visibility};

/// Dispatch resolution
pub use crate::program::{HierarchyResolver, Resolution, Resolver};

// ================================================================================================
// Grouping, Rewriting, Diagnostics
// ================================================================================================

/// Policies and groups
pub use crate::policy::{MergeGroup, Policy, PolicyScheduler};

/// The rewrite lens
pub use crate::lens::{ExtraParameter, MethodLookup, RewriteLens};

/// Diagnostics
pub use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLog};
