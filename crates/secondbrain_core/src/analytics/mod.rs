//! Graph analytics over an entity snapshot.
//!
//! # Responsibility
//! - Derive whole-graph statistics (connections, density, clusters,
//!   isolated entities, recency) on demand.
//! - Answer reachability queries for selection/visualization callers.
//!
//! # Invariants
//! - Pure functions of the snapshot passed in; nothing is cached.
//! - Traversal uses an explicit stack, never recursion.
//! - Dangling edges are skipped, never an error.

pub mod graph;
pub mod stats;

pub use graph::{reachable_from, LinkGraph};
pub use stats::{analyze, AnalyticsOptions, GraphStats};
