//! Live entities behind an entity's edge list, grouped by type.

use crate::model::entity::{Entity, EntityType};
use crate::model::link::NodeKey;
use crate::model::snapshot::GraphSnapshot;
use crate::repo::entity_store::{EntityStores, RepoResult};

/// Linked entities grouped by type, in edge-list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedView {
    pub notes: Vec<Entity>,
    pub ideas: Vec<Entity>,
    pub tasks: Vec<Entity>,
    pub reminders: Vec<Entity>,
}

impl LinkedView {
    pub fn of_type(&self, kind: EntityType) -> &[Entity] {
        match kind {
            EntityType::Note => &self.notes,
            EntityType::Idea => &self.ideas,
            EntityType::Task => &self.tasks,
            EntityType::Reminder => &self.reminders,
        }
    }

    fn push(&mut self, entity: Entity) {
        match entity.kind {
            EntityType::Note => self.notes.push(entity),
            EntityType::Idea => self.ideas.push(entity),
            EntityType::Task => self.tasks.push(entity),
            EntityType::Reminder => self.reminders.push(entity),
        }
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.of_type(key.kind).iter().any(|entity| entity.id == key.id)
    }

    pub fn len(&self) -> usize {
        self.notes.len() + self.ideas.len() + self.tasks.len() + self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves every edge of `entity` through the owning store.
///
/// Entries whose target no longer resolves are dropped. Store failures are
/// returned, since they say nothing about whether the target exists.
pub fn linked_view(entity: &Entity, stores: &impl EntityStores) -> RepoResult<LinkedView> {
    let mut view = LinkedView::default();
    for edge in &entity.edges {
        let store = stores.store(edge.target_type());
        if let Some(target) = store.find_by_id(edge.target_id())? {
            view.push(target);
        }
    }
    Ok(view)
}

/// Same projection resolved against an in-memory snapshot.
pub fn linked_view_in(entity: &Entity, snapshot: &GraphSnapshot) -> LinkedView {
    let mut view = LinkedView::default();
    for edge in &entity.edges {
        if let Some(target) = snapshot.get(edge.target_key()) {
            if !target.is_deleted {
                view.push(target.clone());
            }
        }
    }
    view
}
