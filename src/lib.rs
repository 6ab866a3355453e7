// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # classfold
//!
//! Horizontal class merging for whole-program Java bytecode optimizers.
//!
//! Many programs carry large numbers of small, structurally similar classes: lambdas,
//! anonymous listeners, strategy objects, generated adapters. None of them is a subclass
//! of another, so vertical merging cannot touch them. `classfold` merges such *siblings*
//! into a single class: fields are packed into shared slots, constructors and virtual
//! methods whose bodies differ dispatch on a synthesized `int` class id, and every
//! reference in the program is rewritten through a [`RewriteLens`].
//!
//! ## Features
//!
//! - **Policy pipeline** - an ordered, deterministic list of grouping policies that keeps
//!   every merge observably equivalent to the original program
//! - **Class-initializer deadlock detection** - optional analysis that refuses merges
//!   which coalesce initialization locks into a cycle
//! - **Parallel planning** - merge plans are computed with `rayon` against the immutable
//!   program and committed in group order
//! - **Retracing** - the lens remembers the original of every moved or renamed member
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use classfold::prelude::*;
//!
//! let mut program: Program = load_program()?;
//! let result = HorizontalClassMerger::new(MergerConfig::default()).run(&mut program)?;
//! println!("merged away {} classes", result.removed_class_count());
//! for merged in &result.merged {
//!     println!("{} <- {:?}", merged.target, merged.sources);
//! }
//! # Ok::<(), classfold::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`program`] - the program model: classes, members, code, hierarchy queries
//! - [`policy`] - candidate grouping through an ordered list of policies
//! - [`deadlock`] - the class-initialization deadlock detector
//! - [`merger`] - merge plans and the [`HorizontalClassMerger`] driver
//! - [`tree_fixer`] - signature collision repair after merging
//! - [`lens`] - the rewrite lens and the program-wide rewriter
//! - [`diagnostics`] - structured records of every decision
//! - [`config`] - [`MergerConfig`] and its strategy hooks
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Error Handling
//!
//! Structural incompatibilities found while planning a group are not errors: the group is
//! skipped and a diagnostic is recorded. [`HorizontalClassMerger::run`] only fails on
//! invariant violations, unresolvable signature collisions and references left dangling
//! after rewriting.

#[macro_use]
pub(crate) mod error;

/// Shared functionality used by unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,ignore
/// use classfold::prelude::*;
///
/// let result = HorizontalClassMerger::new(MergerConfig::conservative()).run(&mut program)?;
/// # Ok::<(), classfold::Error>(())
/// ```
pub mod prelude;

/// The program model.
///
/// Classes live in an arena keyed by [`program::ClassId`]; everything else refers to them
/// by name. See [`program::Program`].
pub mod program;

/// Graph utilities shared by the analyses.
pub mod utils;

/// Candidate grouping.
///
/// See [`policy::Policy`] and [`policy::PolicyScheduler`].
pub mod policy;

/// Class-initialization deadlock detection.
pub mod deadlock;

/// Merge planning and the top-level driver.
pub mod merger;

/// Signature fix-ups after merging.
pub mod tree_fixer;

/// The rewrite lens.
pub mod lens;

/// Structured diagnostics.
pub mod diagnostics;

/// Merger configuration.
pub mod config;

/// `classfold` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `classfold` Error type
///
/// # Examples
///
/// ```rust,ignore
/// use classfold::{Error, HorizontalClassMerger, MergerConfig};
///
/// match HorizontalClassMerger::new(MergerConfig::default()).run(&mut program) {
///     Ok(result) => println!("{}", result.diagnostics.summary()),
///     Err(Error::MissingReference(reference)) => println!("dangling: {reference}"),
///     Err(e) => println!("Error: {e}"),
/// }
/// ```
pub use error::Error;

/// Main entry point: runs horizontal class merging over a program.
pub use merger::{HorizontalClassMerger, MergePlan, MergeResult, MergedClass};

/// Configuration of a merging run.
pub use config::MergerConfig;

/// Maps references of the original program to the merged one.
pub use lens::RewriteLens;
