//! Domain model for linkable knowledge items.
//!
//! # Responsibility
//! - Define the entity record shared by note/idea/task/reminder stores.
//! - Define one normalized edge shape for every store's link layout.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityId`.
//! - Edges live inside the owning entity; there is no separate link table
//!   in the domain model.

pub mod entity;
pub mod link;
pub mod snapshot;
