use thiserror::Error;

use crate::program::TypeName;

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! incompatible {
    ($class:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::StructuralIncompatibility {
            class: $class.clone(),
            message: format!($fmt $(, $arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Fatal
/// - [`Error::Invariant`] - an internal consistency check failed; always a bug
/// - [`Error::MissingReference`] - a rewritten reference no longer resolves in the merged program
/// - [`Error::UnresolvableCollision`] - two members that must keep their names collide after merging
/// - [`Error::ClassNotFound`] - a class id or name does not denote a live class
/// - [`Error::DuplicateClass`] - the program already defines a class with this name
///
/// ## Recoverable
/// - [`Error::StructuralIncompatibility`] - one merge group cannot be built; the merger rolls
///   that group back and records a diagnostic instead of propagating this error
///
/// ## Support
/// - [`Error::GraphError`] - invalid graph operation
///
/// # Examples
///
/// ```rust,ignore
/// use classfold::{Error, HorizontalClassMerger, MergerConfig};
///
/// match HorizontalClassMerger::new(MergerConfig::default()).run(&mut program) {
///     Ok(result) => println!("merged {} classes", result.removed_class_count()),
///     Err(Error::MissingReference(reference)) => eprintln!("broken reference: {reference}"),
///     Err(e) => eprintln!("merging failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An internal invariant was violated.
    ///
    /// Raised for conditions that can only arise from a bug in the merger, for example
    /// two classes related by inheritance ending up in the same merge group.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violated - {file}:{line}: {message}")]
    Invariant {
        /// The message to be printed for the Invariant error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A merge group cannot be constructed.
    ///
    /// This error never leaves the merger: the affected group is left unmerged and the
    /// reason is recorded as a diagnostic.
    #[error("Cannot merge {class}: {message}")]
    StructuralIncompatibility {
        /// The class whose members could not be reconciled
        class: TypeName,
        /// Why the merge was abandoned
        message: String,
    },

    /// A reference in the rewritten program does not resolve.
    ///
    /// This fails the whole run; emitting the program would produce broken bytecode.
    #[error("Missing reference after class merging: {0}")]
    MissingReference(String),

    /// Two members that must keep their signature collide after merging.
    #[error("Unresolvable member collision in {class}: {signature}")]
    UnresolvableCollision {
        /// The class holding both members
        class: TypeName,
        /// The colliding signature
        signature: String,
    },

    /// A class could not be found in the program.
    #[error("Class not found - {0}")]
    ClassNotFound(TypeName),

    /// A class with this name is already defined.
    #[error("Duplicate class definition - {0}")]
    DuplicateClass(TypeName),

    /// Graph operation error.
    ///
    /// Raised when building the class-initialization dependency graph with invalid node ids.
    #[error("{0}")]
    GraphError(String),
}

impl Error {
    /// Returns true if the error only affects a single merge group.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StructuralIncompatibility { .. })
    }
}
