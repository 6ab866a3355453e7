//! Supporting data structures that are not specific to class merging.

pub mod graph;
