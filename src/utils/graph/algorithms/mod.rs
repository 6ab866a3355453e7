//! Graph algorithms used by the merging analyses.
//!
//! - [`strongly_connected_components`] / [`is_on_cycle`] - Tarjan's SCC algorithm
//! - [`reachable_from`] / [`has_path`] - reachability
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | SCC | O(V + E) | Pre-existing initialization cycles |
//! | Reachability | O(V + E) | Lock acquisition paths between merge candidates |

mod scc;
mod traversal;

pub use scc::{is_on_cycle, strongly_connected_components};
pub use traversal::{has_path, reachable_from};
