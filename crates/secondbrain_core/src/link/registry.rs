//! Link registry: pure checks over embedded edge lists.
//!
//! # Invariants
//! - No function here performs I/O; callers pass the entities they hold.
//! - An edge list never gains a second entry for the same `(id, type)`.

use crate::link::protocol::{reciprocal_edge, DirectedWrite, LinkMutation};
use crate::model::entity::{Entity, EntityId, EntityType};
use crate::model::link::{Edge, NodeKey};
use crate::model::snapshot::GraphSnapshot;
use std::collections::BTreeSet;

/// Whether `entity` already holds an edge to `(target_id, target_type)`.
pub fn already_linked(entity: &Entity, target_id: EntityId, target_type: EntityType) -> bool {
    entity
        .edges
        .iter()
        .any(|edge| edge.points_to(target_id, target_type))
}

/// Ids already linked from `entity`, restricted to `types`.
///
/// Used to exclude existing links from "pick something to link" lists.
pub fn compute_already_linked_ids(
    entity: &Entity,
    types: &BTreeSet<EntityType>,
) -> BTreeSet<EntityId> {
    entity
        .edges
        .iter()
        .filter(|edge| types.contains(&edge.target_type()))
        .map(Edge::target_id)
        .collect()
}

/// Appends `edge` unless an edge to the same target exists. Returns whether
/// the list changed.
pub fn apply_add(entity: &mut Entity, edge: Edge) -> bool {
    if edge.target_id() == entity.id
        || already_linked(entity, edge.target_id(), edge.target_type())
    {
        return false;
    }
    entity.edges.push(edge);
    true
}

/// Removes the edge to `(target_id, target_type)`. Returns whether the list
/// changed.
pub fn apply_remove(entity: &mut Entity, target_id: EntityId, target_type: EntityType) -> bool {
    let before = entity.edges.len();
    entity
        .edges
        .retain(|edge| !edge.points_to(target_id, target_type));
    entity.edges.len() != before
}

/// Finds edges whose resolvable target lacks the reciprocal entry.
///
/// Each result is the write that would restore symmetry. Dangling targets
/// are skipped.
pub fn find_asymmetric_edges(snapshot: &GraphSnapshot) -> Vec<DirectedWrite> {
    let mut missing = Vec::new();
    for owner in snapshot.iter() {
        let owner_key = NodeKey::new(owner.id, owner.kind);
        for edge in &owner.edges {
            let Some(target) = snapshot.get(edge.target_key()) else {
                continue;
            };
            if already_linked(target, owner.id, owner.kind) {
                continue;
            }
            missing.push(DirectedWrite {
                owner_id: target.id,
                owner_type: target.kind,
                mutation: LinkMutation::Add(reciprocal_edge(owner_key, edge)),
            });
        }
    }
    missing
}
