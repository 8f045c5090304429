//! Link-graph core for SecondBrain.
//! This crate owns the invariants of cross-type links between notes, ideas,
//! tasks and reminders, and the analytics derived from them.

pub mod analytics;
pub mod db;
pub mod link;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use analytics::{analyze, reachable_from, AnalyticsOptions, GraphStats, LinkGraph};
pub use link::registry::{already_linked, compute_already_linked_ids, find_asymmetric_edges};
pub use link::{
    DirectedWrite, LinkError, LinkMutation, LinkOutcome, LinkPlan, LinkResult, LinkSaga,
    LinkService, PlanKind,
};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LoggingConfig,
};
pub use model::entity::{Entity, EntityId, EntityType, EntityValidationError};
pub use model::link::{Edge, EdgeTarget, LinkRequest, LinkType, NodeKey};
pub use model::snapshot::GraphSnapshot;
pub use query::{
    candidates_excluding, candidates_for_filter, linked_view, linked_view_in, ItemTypeFilter,
    LinkedView,
};
pub use repo::entity_store::{load_snapshot, EntityStore, EntityStores, RepoError, RepoResult};
pub use repo::sqlite_store::{SqliteEntityStore, SqliteStores};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
