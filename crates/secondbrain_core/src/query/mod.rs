//! Read-only link projections for selection and search callers.
//!
//! # Invariants
//! - Nothing here mutates entities or stores.
//! - Results are recomputed on every call; nothing is cached.
//! - Dangling edges are dropped silently.

pub mod candidates;
pub mod linked_view;

pub use candidates::{candidates_excluding, candidates_for_filter, ItemTypeFilter};
pub use linked_view::{linked_view, linked_view_in, LinkedView};
