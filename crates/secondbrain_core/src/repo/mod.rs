//! Entity store contracts and the bundled SQLite implementation.
//!
//! # Responsibility
//! - Define the narrow per-type store capability the link core calls.
//! - Keep SQL details behind the `EntityStore` seam.
//!
//! # Invariants
//! - Store writes validate entity shape before persistence.
//! - Stores return semantic errors (`NotFound`) in addition to transport
//!   errors.

pub mod entity_store;
pub mod sqlite_store;
