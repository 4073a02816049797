//! A minimal incremental build engine.
//!
//! Callers describe a build as named rules, each producing one output file
//! from zero or more inputs via a recipe closure.  [`make`] compiles the
//! rules into a deduplicated dependency graph, decides per rule whether its
//! recipe must actually run (by timestamp comparison, or by content hash
//! against a persisted digest), and executes independent rules in parallel.
//! A rule shared by multiple requested outputs runs at most once.

pub mod fs;
pub mod graph;
pub mod hash;
pub mod make;
pub mod stale;
pub mod trace;
pub mod work;

pub use crate::graph::{DuplicateOutput, GraphError};
pub use crate::make::{make, MakeOptions, Rule};
pub use crate::stale::{InputHash, Mtime, Recipe, Staleness};
