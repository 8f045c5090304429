//! Undirected adjacency view and traversal.

use crate::model::link::NodeKey;
use crate::model::snapshot::GraphSnapshot;
use petgraph::graphmap::UnGraphMap;
use std::collections::BTreeSet;

/// Undirected adjacency built from every edge list in a snapshot.
///
/// Storage direction is ignored: an edge A→B makes A and B neighbours of
/// each other even if B lacks the reciprocal entry.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    graph: UnGraphMap<NodeKey, ()>,
}

impl LinkGraph {
    /// Builds the graph; edges to keys absent from the snapshot are dropped.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let mut graph = UnGraphMap::with_capacity(snapshot.len(), 0);
        for entity in snapshot.iter() {
            graph.add_node(NodeKey::new(entity.id, entity.kind));
        }

        for entity in snapshot.iter() {
            let owner = NodeKey::new(entity.id, entity.kind);
            for edge in &entity.edges {
                let target = edge.target_key();
                if target == owner || !graph.contains_node(target) {
                    continue;
                }
                graph.add_edge(owner, target, ());
            }
        }

        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.graph.contains_node(key)
    }

    pub fn neighbors(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        self.graph.neighbors(key)
    }

    pub fn degree(&self, key: NodeKey) -> usize {
        self.graph.neighbors(key).count()
    }

    /// Connected components, each listed in discovery order. Components are
    /// ordered by their smallest node key.
    pub fn components(&self) -> Vec<Vec<NodeKey>> {
        let mut visited = BTreeSet::new();
        let mut components = Vec::new();
        for start in self.sorted_nodes() {
            if visited.contains(&start) {
                continue;
            }
            components.push(self.walk(start, &mut visited));
        }
        components
    }

    /// Node with the highest degree; ties go to the smallest key. `None`
    /// when no node has an edge.
    pub fn most_connected(&self) -> Option<(NodeKey, usize)> {
        self.sorted_nodes()
            .into_iter()
            .map(|key| (key, self.degree(key)))
            .filter(|(_, degree)| *degree > 0)
            .fold(None, |best, candidate| match best {
                Some((_, best_degree)) if best_degree >= candidate.1 => best,
                _ => Some(candidate),
            })
    }

    fn sorted_nodes(&self) -> Vec<NodeKey> {
        let mut nodes: Vec<NodeKey> = self.graph.nodes().collect();
        nodes.sort_unstable();
        nodes
    }

    fn walk(&self, start: NodeKey, visited: &mut BTreeSet<NodeKey>) -> Vec<NodeKey> {
        let mut stack = vec![start];
        let mut members = Vec::new();
        visited.insert(start);
        while let Some(node) = stack.pop() {
            members.push(node);
            for next in self.neighbors(node) {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        members
    }
}

/// All nodes reachable from `start`, excluding `start`, sorted by key.
///
/// Returns an empty list when `start` is not in the snapshot.
pub fn reachable_from(snapshot: &GraphSnapshot, start: NodeKey) -> Vec<NodeKey> {
    let graph = LinkGraph::from_snapshot(snapshot);
    if !graph.contains(start) {
        return Vec::new();
    }
    let mut visited = BTreeSet::new();
    let mut reachable = graph.walk(start, &mut visited);
    reachable.retain(|key| *key != start);
    reachable.sort();
    reachable
}

#[cfg(test)]
mod tests {
    use super::{reachable_from, LinkGraph};
    use crate::model::entity::{Entity, EntityType};
    use crate::model::link::{Edge, LinkType, NodeKey};
    use crate::model::snapshot::GraphSnapshot;
    use uuid::Uuid;

    fn key(entity: &Entity) -> NodeKey {
        NodeKey::new(entity.id, entity.kind)
    }

    fn link_one_way(from: &mut Entity, to: &Entity) {
        from.edges
            .push(Edge::typed(to.id, to.kind, None, LinkType::Default, None));
    }

    #[test]
    fn one_directional_edges_still_join_components() {
        let mut idea = Entity::new(EntityType::Idea, "idea");
        let task = Entity::new(EntityType::Task, "task");
        link_one_way(&mut idea, &task);

        let graph = LinkGraph::from_snapshot(&GraphSnapshot::from_entities([idea, task]));
        assert_eq!(graph.components().len(), 1);
    }

    #[test]
    fn long_chain_is_traversed_without_recursion() {
        let mut entities: Vec<Entity> = (0..20_000)
            .map(|idx| Entity::new(EntityType::Note, format!("n{idx}")))
            .collect();
        for idx in 1..entities.len() {
            let previous = entities[idx - 1].id;
            entities[idx]
                .edges
                .push(Edge::plain(previous, LinkType::Default, None));
        }
        let snapshot = GraphSnapshot::from_entities(entities);
        let graph = LinkGraph::from_snapshot(&snapshot);
        let components = graph.components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 20_000);
    }

    #[test]
    fn ids_shared_across_types_are_distinct_nodes() {
        let shared = Uuid::new_v4();
        let note = Entity::with_id(shared, EntityType::Note, "note").unwrap();
        let idea = Entity::with_id(shared, EntityType::Idea, "idea").unwrap();
        let graph = LinkGraph::from_snapshot(&GraphSnapshot::from_entities([note, idea]));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.components().len(), 2);
    }

    #[test]
    fn reachable_from_follows_links_across_types() {
        let mut idea = Entity::new(EntityType::Idea, "idea");
        let mut note = Entity::new(EntityType::Note, "note");
        let task = Entity::new(EntityType::Task, "task");
        let loner = Entity::new(EntityType::Reminder, "loner");
        link_one_way(&mut idea, &note);
        link_one_way(&mut note, &task);
        link_one_way(&mut note, &idea);

        let mut expected = vec![key(&note), key(&task)];
        expected.sort();
        let start = key(&idea);
        let snapshot = GraphSnapshot::from_entities([idea, note, task, loner]);
        assert_eq!(reachable_from(&snapshot, start), expected);
        let unknown = NodeKey::new(Uuid::new_v4(), EntityType::Idea);
        assert!(reachable_from(&snapshot, unknown).is_empty());
    }

    #[test]
    fn most_connected_prefers_highest_degree() {
        let mut hub = Entity::new(EntityType::Idea, "hub");
        let a = Entity::new(EntityType::Note, "a");
        let b = Entity::new(EntityType::Task, "b");
        link_one_way(&mut hub, &a);
        link_one_way(&mut hub, &b);
        let hub_key = key(&hub);

        let graph = LinkGraph::from_snapshot(&GraphSnapshot::from_entities([hub, a, b]));
        assert_eq!(graph.most_connected(), Some((hub_key, 2)));
        assert_eq!(LinkGraph::default().most_connected(), None);
    }
}
