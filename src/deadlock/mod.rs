//! Class-initializer deadlock detection.
//!
//! The JVM initializes a class under a per-class initialization lock. A thread running
//! `A.<clinit>` that touches `B` needs `B`'s lock while still holding `A`'s. Merging
//! classes coalesces their locks, which can turn two independently safe lock orders into
//! a cycle:
//!
//! ```text
//!   before:  A -> C -> B          after merging A and B into AB:
//!            (no cycle)                AB -> C -> AB   (cycle)
//! ```
//!
//! Thread 1 initializes `AB` and waits for `C`; thread 2 initializes `C` and waits for
//! `AB`. The analysis is static and sound rather than precise: anything the tracer cannot
//! follow is assumed to reach every class.
//!
//! # Architecture
//!
//! - [`InitializationTracer`] computes the classes a single `<clinit>` may initialize
//! - [`InitializationGraph`] closes that relation over all candidate classes, with classes
//!   of other groups coalesced
//! - [`NoClassInitializerCycles`] is the grouping policy built on top

mod cycles;
mod tracer;

pub use cycles::{InitializationGraph, NoClassInitializerCycles};
pub use tracer::{InitializationTracer, Untraceable};
