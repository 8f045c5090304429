//! Entity domain model.
//!
//! # Responsibility
//! - Define the canonical record for notes, ideas, tasks and reminders.
//! - Provide lifecycle helpers for archive/soft-delete semantics.
//!
//! # Invariants
//! - `id` is stable and never reused for another entity.
//! - An entity never carries an edge pointing at itself.
//! - An entity never carries two edges with the same `(id, kind)` target.
//! - `tags` are lowercase, trimmed and deduplicated.

use crate::model::link::Edge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier for every linkable entity.
///
/// Ids are only guaranteed unique within one `EntityType`; graph code keys
/// nodes by `(id, kind)`.
pub type EntityId = Uuid;

/// Tag that marks a note-like item as an idea.
pub const IDEA_TAG: &str = "idea";

/// Kind of linkable entity. Each kind is owned by its own store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Note,
    Idea,
    Task,
    Reminder,
}

impl EntityType {
    /// All kinds in stable order.
    pub const ALL: [EntityType; 4] = [
        EntityType::Note,
        EntityType::Idea,
        EntityType::Task,
        EntityType::Reminder,
    ];

    /// Lowercase wire/storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Idea => "idea",
            Self::Task => "task",
            Self::Reminder => "reminder",
        }
    }

    /// Parses a wire/storage name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "note" => Some(Self::Note),
            "idea" => Some(Self::Idea),
            "task" => Some(Self::Task),
            "reminder" => Some(Self::Reminder),
            _ => None,
        }
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation error for entity shape invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    /// `id` must not be the nil UUID.
    NilId,
    /// `updated_at` is earlier than `created_at`.
    InvalidTimestamps { created_at: i64, updated_at: i64 },
    /// Entity has an edge pointing at its own id.
    SelfEdge(EntityId),
    /// Entity has two edges to the same `(id, kind)` target.
    DuplicateEdge { id: EntityId, kind: EntityType },
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "entity id must not be nil"),
            Self::InvalidTimestamps {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({updated_at}) must be >= created_at ({created_at})"
            ),
            Self::SelfEdge(id) => write!(f, "entity {id} links to itself"),
            Self::DuplicateEdge { id, kind } => {
                write!(f, "duplicate edge to {kind} {id}")
            }
        }
    }
}

impl Error for EntityValidationError {}

/// Canonical record for every linkable item.
///
/// Title/content are display-only for the graph; only `edges` and the
/// lifecycle flags matter to linking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: EntityType,
    pub title: String,
    pub content: String,
    pub tags: BTreeSet<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    pub is_archived: bool,
    /// Soft delete tombstone.
    pub is_deleted: bool,
    /// Outgoing edge list owned by this entity.
    pub edges: Vec<Edge>,
}

impl Entity {
    /// Creates a new entity with a generated id and current timestamps.
    pub fn new(kind: EntityType, title: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            content: String::new(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            is_archived: false,
            is_deleted: false,
            edges: Vec::new(),
        }
    }

    /// Creates an entity with a caller-provided id.
    ///
    /// Used by import paths and tests where identity already exists.
    pub fn with_id(
        id: EntityId,
        kind: EntityType,
        title: impl Into<String>,
    ) -> Result<Self, EntityValidationError> {
        if id.is_nil() {
            return Err(EntityValidationError::NilId);
        }
        let mut entity = Self::new(kind, title);
        entity.id = id;
        Ok(entity)
    }

    /// Builder-style content setter.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Replaces tags with their normalized form.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
    }

    /// Whether a note-like item is classified as an idea by tag.
    pub fn is_idea_tagged(&self) -> bool {
        self.kind == EntityType::Idea || self.tags.contains(IDEA_TAG)
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    pub fn restore(&mut self) {
        self.is_deleted = false;
    }

    pub fn archive(&mut self) {
        self.is_archived = true;
    }

    /// Whether this entity may take part in new links.
    pub fn is_active(&self) -> bool {
        !self.is_deleted && !self.is_archived
    }

    /// Checks entity shape invariants.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.id.is_nil() {
            return Err(EntityValidationError::NilId);
        }
        if self.updated_at < self.created_at {
            return Err(EntityValidationError::InvalidTimestamps {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }

        let mut seen = BTreeSet::new();
        for edge in &self.edges {
            if edge.target_id() == self.id {
                return Err(EntityValidationError::SelfEdge(self.id));
            }
            let key = (edge.target_id(), edge.target_type());
            if !seen.insert(key) {
                return Err(EntityValidationError::DuplicateEdge {
                    id: key.0,
                    kind: key.1,
                });
            }
        }
        Ok(())
    }
}

/// Normalizes tag values: trim, lowercase, drop blanks, dedupe.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| {
            let normalized = tag.as_ref().trim().to_lowercase();
            (!normalized.is_empty()).then_some(normalized)
        })
        .collect()
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
