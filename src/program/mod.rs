//! In-memory model of the program being optimized.
//!
//! The program is an arena of [`ClassDef`]s keyed by stable [`ClassId`]s. Classes own their
//! fields and methods; everything else, including inheritance and every reference made by
//! code, is expressed symbolically through [`TypeName`], [`FieldRef`] and [`MethodRef`].
//!
//! # Architecture
//!
//! ```text
//!   Program ── Vec<Option<ClassDef>> ──┬── FieldDef  (holder: ClassId)
//!      │                               └── MethodDef (holder: ClassId) ── Code
//!      │
//!      ├── hierarchy queries (superclass chain, interfaces, LUB)   hierarchy.rs
//!      ├── SubtypeIndex (inverse supertype relation)               hierarchy.rs
//!      ├── ReferenceIndex (reference -> use sites)                 references.rs
//!      └── Resolver (virtual dispatch collaborator)                resolution.rs
//! ```
//!
//! # Key Components
//!
//! - [`Program`] - the arena plus data resources and the startup profile
//! - [`ClassDef`], [`FieldDef`], [`MethodDef`] - definitions
//! - [`Code`] / [`Instruction`] - method bodies
//! - [`ReferenceIndex`] - reverse reference index
//! - [`Resolver`] / [`HierarchyResolver`] - dispatch resolution

mod class;
mod code;
mod flags;
mod hierarchy;
mod names;
#[allow(clippy::module_inception)]
mod program;
mod references;
mod resolution;

pub use class::{
    Annotation, AnnotationValue, ClassDef, ClassId, ClassOrigin, FieldDef, MethodDef, Placement,
};
pub use code::{
    Code, ExceptionHandler, Instruction, InvokeKind, Label, LocalVariable, ReferenceKind,
};
pub use flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, Visibility};
pub use hierarchy::SubtypeIndex;
pub use names::{
    FieldRef, MethodRef, MethodSig, Proto, Reference, TypeName, TypeRef, CLINIT, INIT,
    JAVA_LANG_OBJECT,
};
pub use program::{DataResource, ProfileRule, Program};
pub use references::{ReferenceIndex, ReferenceSite};
pub use resolution::{HierarchyResolver, Resolution, Resolver};
