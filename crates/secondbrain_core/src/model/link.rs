//! Link/edge domain model.
//!
//! # Responsibility
//! - Unify the per-store link layouts behind one `Edge` shape.
//! - Define link classification and connect request inputs.
//!
//! # Invariants
//! - `EdgeTarget::PlainId` is only used for note-to-note mirrored links and
//!   always resolves to `EntityType::Note`.
//! - Edge identity is `(target_id, target_type)`; `link_type`, `description`
//!   and `created_at` are payload.

use crate::model::entity::{EntityId, EntityType};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Free-form classification of a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    #[default]
    Default,
    Related,
    Reference,
    Child,
    Parent,
}

impl LinkType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Related => "related",
            Self::Reference => "reference",
            Self::Child => "child",
            Self::Parent => "parent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" | "" => Some(Self::Default),
            "related" => Some(Self::Related),
            "reference" => Some(Self::Reference),
            "child" => Some(Self::Child),
            "parent" => Some(Self::Parent),
            _ => None,
        }
    }
}

impl Display for LinkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of one edge as stored by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum EdgeTarget {
    /// Bare id in a mirrored note-to-note list.
    PlainId { id: EntityId },
    /// Id tagged with the target's type, as idea/task/reminder lists store it.
    TypedTuple {
        id: EntityId,
        #[serde(rename = "type")]
        kind: EntityType,
        description: Option<String>,
    },
}

/// One recorded link from the owning entity to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub target: EdgeTarget,
    #[serde(default)]
    pub link_type: LinkType,
    /// Epoch milliseconds; absent for edges imported without a timestamp.
    pub created_at: Option<i64>,
}

impl Edge {
    /// Mirrored note-to-note edge.
    pub fn plain(id: EntityId, link_type: LinkType, created_at: Option<i64>) -> Self {
        Self {
            target: EdgeTarget::PlainId { id },
            link_type,
            created_at,
        }
    }

    /// Typed edge carrying the target's type.
    pub fn typed(
        id: EntityId,
        kind: EntityType,
        description: Option<String>,
        link_type: LinkType,
        created_at: Option<i64>,
    ) -> Self {
        Self {
            target: EdgeTarget::TypedTuple {
                id,
                kind,
                description,
            },
            link_type,
            created_at,
        }
    }

    pub fn target_id(&self) -> EntityId {
        match &self.target {
            EdgeTarget::PlainId { id } | EdgeTarget::TypedTuple { id, .. } => *id,
        }
    }

    pub fn target_type(&self) -> EntityType {
        match &self.target {
            EdgeTarget::PlainId { .. } => EntityType::Note,
            EdgeTarget::TypedTuple { kind, .. } => *kind,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match &self.target {
            EdgeTarget::PlainId { .. } => None,
            EdgeTarget::TypedTuple { description, .. } => description.as_deref(),
        }
    }

    pub fn target_key(&self) -> NodeKey {
        NodeKey::new(self.target_id(), self.target_type())
    }

    /// Whether this edge points at `(id, kind)`.
    pub fn points_to(&self, id: EntityId, kind: EntityType) -> bool {
        self.target_id() == id && self.target_type() == kind
    }
}

/// Graph node identity. Ids are only unique per type, so nodes are keyed by
/// both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: EntityType,
}

impl NodeKey {
    pub fn new(id: EntityId, kind: EntityType) -> Self {
        Self { id, kind }
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Conceptual "connect/disconnect A and B" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub source_id: EntityId,
    pub source_type: EntityType,
    pub target_id: EntityId,
    pub target_type: EntityType,
    pub link_type: LinkType,
    pub description: Option<String>,
    /// Report `AlreadyLinked` instead of the idempotent no-op.
    pub strict: bool,
}

impl LinkRequest {
    /// Request with default link type, no description, idempotent semantics.
    pub fn new(
        source_id: EntityId,
        source_type: EntityType,
        target_id: EntityId,
        target_type: EntityType,
    ) -> Self {
        Self {
            source_id,
            source_type,
            target_id,
            target_type,
            link_type: LinkType::Default,
            description: None,
            strict: false,
        }
    }

    pub fn with_link_type(mut self, link_type: LinkType) -> Self {
        self.link_type = link_type;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn source_key(&self) -> NodeKey {
        NodeKey::new(self.source_id, self.source_type)
    }

    pub fn target_key(&self) -> NodeKey {
        NodeKey::new(self.target_id, self.target_type)
    }
}
