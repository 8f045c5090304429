//! Entity store capability consumed by the link core.
//!
//! # Responsibility
//! - Define per-type read access and single-link mutation persistence.
//! - Map an `EntityType` to the store that owns it.
//!
//! # Invariants
//! - Each entity is mutated only through the store of its own type.
//! - `persist_link_add` is idempotent for an existing `(id, type)` edge.
//! - `find_by_id` never returns soft-deleted entities.

use crate::db::DbError;
use crate::model::entity::{Entity, EntityId, EntityType, EntityValidationError};
use crate::model::link::{Edge, LinkType};
use crate::model::snapshot::GraphSnapshot;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for entity persistence and lookup.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntityValidationError),
    Db(DbError),
    NotFound(EntityId),
    InvalidData(String),
    /// Store rejected the call for reasons outside graph validation
    /// (network, auth, server).
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Per-type entity store.
pub trait EntityStore {
    /// The entity type this store owns.
    fn kind(&self) -> EntityType;

    /// Looks up one entity; soft-deleted entities resolve to `None`.
    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<Entity>>;

    /// Lists all non-deleted entities of this type, edges included.
    fn list(&self) -> RepoResult<Vec<Entity>>;

    /// Appends one edge to the entity's list and returns the updated entity.
    fn persist_link_add(&self, entity_id: EntityId, edge: &Edge) -> RepoResult<Entity>;

    /// Removes the edge to `(target_id, target_type)` and returns the
    /// updated entity. Removing an absent edge is a no-op.
    fn persist_link_remove(
        &self,
        entity_id: EntityId,
        target_id: EntityId,
        target_type: EntityType,
    ) -> RepoResult<Entity>;

    /// Writes a mirrored plain-id pair between two entities of this store in
    /// one atomic step.
    ///
    /// Returns `Ok(None)` when the store has no atomic pair write; callers then
    /// issue the two `persist_link_add` calls themselves and track which half
    /// landed.
    fn persist_mirror_add(
        &self,
        _first: EntityId,
        _second: EntityId,
        _link_type: LinkType,
        _created_at: i64,
    ) -> RepoResult<Option<(Entity, Entity)>> {
        Ok(None)
    }
}

/// Directory of per-type stores.
pub trait EntityStores {
    fn store(&self, kind: EntityType) -> &dyn EntityStore;
}

impl<T: EntityStores + ?Sized> EntityStores for &T {
    fn store(&self, kind: EntityType) -> &dyn EntityStore {
        (**self).store(kind)
    }
}

/// Loads every non-deleted entity from every store into one snapshot.
pub fn load_snapshot(stores: &impl EntityStores) -> RepoResult<GraphSnapshot> {
    let mut snapshot = GraphSnapshot::default();
    for kind in EntityType::ALL {
        *snapshot.entities_mut(kind) = stores.store(kind).list()?;
    }
    Ok(snapshot)
}
