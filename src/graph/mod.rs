//! Page-load dependency graph: network requests and main-thread tasks
//! linked by "must finish before" edges.

pub mod dependency_graph;
pub mod types;

pub use dependency_graph::{DependencyGraph, GraphError};
pub use types::*;
