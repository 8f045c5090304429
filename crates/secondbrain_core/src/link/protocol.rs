//! Link protocol resolver.
//!
//! Translates one conceptual "connect/disconnect A and B" request into the
//! directional edge writes each store understands.
//!
//! | source \ target | Note           | Idea/Task/Reminder |
//! |-----------------|----------------|--------------------|
//! | Note            | mirrored plain | two-way typed      |
//! | Idea/Task/Rem.  | two-way typed  | two-way typed      |
//!
//! # Invariants
//! - `primary` always targets the source's store, `secondary` the target's.
//! - Every typed edge carries the type of the *other* endpoint.

use crate::link::{LinkError, LinkResult};
use crate::model::entity::{Entity, EntityId, EntityType};
use crate::model::link::{Edge, LinkRequest, LinkType, NodeKey};
use crate::repo::entity_store::{EntityStores, RepoResult};

/// How a pair stores the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Note↔Note: one mirrored plain-id list update in the note store.
    Mirrored,
    /// Two independent typed writes, one per store.
    TwoWay,
}

/// Store-level change to one entity's edge list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMutation {
    Add(Edge),
    Remove {
        target_id: EntityId,
        target_type: EntityType,
    },
}

/// One directional write into the store owning `owner_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedWrite {
    pub owner_id: EntityId,
    pub owner_type: EntityType,
    pub mutation: LinkMutation,
}

impl DirectedWrite {
    pub fn owner_key(&self) -> NodeKey {
        NodeKey::new(self.owner_id, self.owner_type)
    }

    pub fn target_key(&self) -> NodeKey {
        match &self.mutation {
            LinkMutation::Add(edge) => edge.target_key(),
            LinkMutation::Remove {
                target_id,
                target_type,
            } => NodeKey::new(*target_id, *target_type),
        }
    }

    /// Whether applying this write would change `owner`'s edge list.
    pub fn is_needed_for(&self, owner: &Entity) -> bool {
        let target = self.target_key();
        let present = owner
            .edges
            .iter()
            .any(|edge| edge.points_to(target.id, target.kind));
        match self.mutation {
            LinkMutation::Add(_) => !present,
            LinkMutation::Remove { .. } => present,
        }
    }

    /// Applies the write through the owner's store.
    pub fn apply<S: EntityStores + ?Sized>(&self, stores: &S) -> RepoResult<Entity> {
        let store = stores.store(self.owner_type);
        match &self.mutation {
            LinkMutation::Add(edge) => store.persist_link_add(self.owner_id, edge),
            LinkMutation::Remove {
                target_id,
                target_type,
            } => store.persist_link_remove(self.owner_id, *target_id, *target_type),
        }
    }

    /// Metadata-only description used in logs and errors.
    pub fn describe(&self) -> String {
        let verb = match self.mutation {
            LinkMutation::Add(_) => "add",
            LinkMutation::Remove { .. } => "remove",
        };
        format!("{verb} {} -> {}", self.owner_key(), self.target_key())
    }
}

/// Ordered pair of writes realizing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlan {
    pub kind: PlanKind,
    pub primary: DirectedWrite,
    pub secondary: DirectedWrite,
}

/// Storage shape for a source/target type pair.
pub fn plan_kind(source_type: EntityType, target_type: EntityType) -> PlanKind {
    if source_type == EntityType::Note && target_type == EntityType::Note {
        PlanKind::Mirrored
    } else {
        PlanKind::TwoWay
    }
}

/// Builds the edge `owner_type` stores when pointing at `(target_id,
/// target_type)`.
pub fn edge_for(
    owner_type: EntityType,
    target_id: EntityId,
    target_type: EntityType,
    link_type: LinkType,
    description: Option<String>,
    created_at: Option<i64>,
) -> Edge {
    match plan_kind(owner_type, target_type) {
        PlanKind::Mirrored => Edge::plain(target_id, link_type, created_at),
        PlanKind::TwoWay => Edge::typed(target_id, target_type, description, link_type, created_at),
    }
}

/// The entry `edge`'s target must hold for the link owned by `owner` to be
/// symmetric.
pub fn reciprocal_edge(owner: NodeKey, edge: &Edge) -> Edge {
    edge_for(
        edge.target_type(),
        owner.id,
        owner.kind,
        edge.link_type,
        edge.description().map(str::to_string),
        edge.created_at,
    )
}

/// Resolves a connect request into its ordered writes.
///
/// # Errors
/// - `InvalidSelfLink` when source and target ids match.
pub fn resolve_connect(request: &LinkRequest, now_ms: i64) -> LinkResult<LinkPlan> {
    reject_self_link(request)?;

    let forward = edge_for(
        request.source_type,
        request.target_id,
        request.target_type,
        request.link_type,
        request.description.clone(),
        Some(now_ms),
    );
    let backward = edge_for(
        request.target_type,
        request.source_id,
        request.source_type,
        request.link_type,
        request.description.clone(),
        Some(now_ms),
    );

    Ok(LinkPlan {
        kind: plan_kind(request.source_type, request.target_type),
        primary: DirectedWrite {
            owner_id: request.source_id,
            owner_type: request.source_type,
            mutation: LinkMutation::Add(forward),
        },
        secondary: DirectedWrite {
            owner_id: request.target_id,
            owner_type: request.target_type,
            mutation: LinkMutation::Add(backward),
        },
    })
}

/// Resolves a disconnect request into its ordered removals.
pub fn resolve_disconnect(request: &LinkRequest) -> LinkResult<LinkPlan> {
    reject_self_link(request)?;

    Ok(LinkPlan {
        kind: plan_kind(request.source_type, request.target_type),
        primary: DirectedWrite {
            owner_id: request.source_id,
            owner_type: request.source_type,
            mutation: LinkMutation::Remove {
                target_id: request.target_id,
                target_type: request.target_type,
            },
        },
        secondary: DirectedWrite {
            owner_id: request.target_id,
            owner_type: request.target_type,
            mutation: LinkMutation::Remove {
                target_id: request.source_id,
                target_type: request.source_type,
            },
        },
    })
}

fn reject_self_link(request: &LinkRequest) -> LinkResult<()> {
    if request.source_id == request.target_id {
        return Err(LinkError::InvalidSelfLink(request.source_id));
    }
    Ok(())
}
