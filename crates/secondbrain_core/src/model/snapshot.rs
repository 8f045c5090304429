//! Explicit entity snapshot passed to analytics and query helpers.
//!
//! Callers own the snapshot; nothing in core caches entities between calls.

use crate::model::entity::{Entity, EntityType};
use crate::model::link::NodeKey;

/// Entity collections per type, as read from the stores at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub notes: Vec<Entity>,
    pub ideas: Vec<Entity>,
    pub tasks: Vec<Entity>,
    pub reminders: Vec<Entity>,
}

impl GraphSnapshot {
    /// Snapshot of notes and ideas only.
    pub fn new(notes: Vec<Entity>, ideas: Vec<Entity>) -> Self {
        Self {
            notes,
            ideas,
            ..Self::default()
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<Entity>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_reminders(mut self, reminders: Vec<Entity>) -> Self {
        self.reminders = reminders;
        self
    }

    /// Builds a snapshot from a mixed collection, bucketing by `kind`.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut snapshot = Self::default();
        for entity in entities {
            snapshot.entities_mut(entity.kind).push(entity);
        }
        snapshot
    }

    pub fn entities(&self, kind: EntityType) -> &[Entity] {
        match kind {
            EntityType::Note => &self.notes,
            EntityType::Idea => &self.ideas,
            EntityType::Task => &self.tasks,
            EntityType::Reminder => &self.reminders,
        }
    }

    pub fn entities_mut(&mut self, kind: EntityType) -> &mut Vec<Entity> {
        match kind {
            EntityType::Note => &mut self.notes,
            EntityType::Idea => &mut self.ideas,
            EntityType::Task => &mut self.tasks,
            EntityType::Reminder => &mut self.reminders,
        }
    }

    /// Every entity in type order: notes, ideas, tasks, reminders.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        EntityType::ALL
            .into_iter()
            .flat_map(move |kind| self.entities(kind).iter())
    }

    pub fn len(&self) -> usize {
        self.notes.len() + self.ideas.len() + self.tasks.len() + self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: NodeKey) -> Option<&Entity> {
        self.entities(key.kind)
            .iter()
            .find(|entity| entity.id == key.id)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Entity> {
        self.entities_mut(key.kind)
            .iter_mut()
            .find(|entity| entity.id == key.id)
    }

    /// Replaces the stored copy of `entity` (matched by id and type), or
    /// appends it when absent.
    pub fn upsert(&mut self, entity: Entity) {
        let key = NodeKey::new(entity.id, entity.kind);
        match self.get_mut(key) {
            Some(slot) => *slot = entity,
            None => self.entities_mut(key.kind).push(entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GraphSnapshot;
    use crate::model::entity::{Entity, EntityType};
    use crate::model::link::NodeKey;

    #[test]
    fn from_entities_buckets_by_kind_and_upsert_replaces() {
        let note = Entity::new(EntityType::Note, "n");
        let task = Entity::new(EntityType::Task, "t");
        let mut snapshot = GraphSnapshot::from_entities([note.clone(), task.clone()]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.entities(EntityType::Task).len(), 1);

        let mut renamed = note.clone();
        renamed.title = "renamed".to_string();
        snapshot.upsert(renamed);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot
                .get(NodeKey::new(note.id, EntityType::Note))
                .map(|entity| entity.title.as_str()),
            Some("renamed")
        );
        assert!(snapshot.get(NodeKey::new(note.id, EntityType::Idea)).is_none());
    }
}
