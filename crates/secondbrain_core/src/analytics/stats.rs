//! Whole-graph statistics.
//!
//! # Invariants
//! - `total_connections` halves the summed edge-list lengths exactly once,
//!   whatever the storage shape (mirrored plain ids or two typed lists).
//! - `connection_density` is an integer percentage and `0` when fewer than
//!   two entities exist.
//! - Recency counts are best-effort: edges without a timestamp fall back to
//!   the owner's `created_at`.

use crate::analytics::graph::LinkGraph;
use crate::model::entity::{now_epoch_ms, EntityType};
use crate::model::link::NodeKey;
use crate::model::snapshot::GraphSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const WEEK_WINDOW_MS: i64 = 7 * DAY_MS;
pub const MONTH_WINDOW_MS: i64 = 30 * DAY_MS;

/// Inputs that are not part of the snapshot itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsOptions {
    /// Reference time for recency windows, epoch milliseconds.
    pub now_ms: i64,
    pub week_window_ms: i64,
    pub month_window_ms: i64,
}

impl AnalyticsOptions {
    /// Default windows evaluated at a fixed reference time.
    pub fn at(now_ms: i64) -> Self {
        Self {
            now_ms,
            week_window_ms: WEEK_WINDOW_MS,
            month_window_ms: MONTH_WINDOW_MS,
        }
    }
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self::at(now_epoch_ms())
    }
}

/// Aggregate statistics consumed by graph visualization callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub total_entities: usize,
    pub total_connections: usize,
    pub total_possible_connections: u64,
    /// `round(total_connections / total_possible_connections * 100)`.
    pub connection_density: u32,
    pub cluster_count: usize,
    pub largest_cluster_size: usize,
    pub isolated_notes: usize,
    pub isolated_ideas: usize,
    pub isolated_tasks: usize,
    pub isolated_reminders: usize,
    pub recent_connections_week: usize,
    pub recent_connections_month: usize,
    pub most_connected: Option<NodeKey>,
}

/// Computes statistics for `snapshot`.
pub fn analyze(snapshot: &GraphSnapshot, options: &AnalyticsOptions) -> GraphStats {
    let total_entities = snapshot.len();
    let edge_entries: usize = snapshot.iter().map(|entity| entity.edges.len()).sum();
    let total_connections = edge_entries / 2;
    let total_possible_connections = possible_connections(total_entities);

    let graph = LinkGraph::from_snapshot(snapshot);
    let components = graph.components();
    let (recent_connections_week, recent_connections_month) = recent_counts(snapshot, options);

    GraphStats {
        total_entities,
        total_connections,
        total_possible_connections,
        connection_density: density_percent(total_connections, total_possible_connections),
        cluster_count: components.len(),
        largest_cluster_size: components.iter().map(Vec::len).max().unwrap_or(0),
        isolated_notes: isolated(snapshot, EntityType::Note),
        isolated_ideas: isolated(snapshot, EntityType::Idea),
        isolated_tasks: isolated(snapshot, EntityType::Task),
        isolated_reminders: isolated(snapshot, EntityType::Reminder),
        recent_connections_week,
        recent_connections_month,
        most_connected: graph.most_connected().map(|(key, _)| key),
    }
}

fn possible_connections(entities: usize) -> u64 {
    let n = entities as u64;
    n * n.saturating_sub(1) / 2
}

fn density_percent(connections: usize, possible: u64) -> u32 {
    if possible == 0 {
        return 0;
    }
    (connections as f64 / possible as f64 * 100.0).round() as u32
}

fn isolated(snapshot: &GraphSnapshot, kind: EntityType) -> usize {
    snapshot
        .entities(kind)
        .iter()
        .filter(|entity| entity.edges.is_empty())
        .count()
}

/// Counts unordered connections created inside the week/month windows.
///
/// A connection's time is the earliest timestamp among its edge entries.
fn recent_counts(snapshot: &GraphSnapshot, options: &AnalyticsOptions) -> (usize, usize) {
    let mut connections: BTreeMap<(NodeKey, NodeKey), i64> = BTreeMap::new();
    for entity in snapshot.iter() {
        let owner = NodeKey::new(entity.id, entity.kind);
        for edge in &entity.edges {
            let target = edge.target_key();
            let pair = if owner <= target {
                (owner, target)
            } else {
                (target, owner)
            };
            let created_at = edge.created_at.unwrap_or(entity.created_at);
            connections
                .entry(pair)
                .and_modify(|earliest| *earliest = (*earliest).min(created_at))
                .or_insert(created_at);
        }
    }

    let week_start = options.now_ms.saturating_sub(options.week_window_ms);
    let month_start = options.now_ms.saturating_sub(options.month_window_ms);
    connections
        .values()
        .fold((0, 0), |(week, month), &created_at| {
            (
                week + usize::from(created_at >= week_start),
                month + usize::from(created_at >= month_start),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::{density_percent, possible_connections};

    #[test]
    fn possible_connections_handles_small_graphs() {
        assert_eq!(possible_connections(0), 0);
        assert_eq!(possible_connections(1), 0);
        assert_eq!(possible_connections(4), 6);
    }

    #[test]
    fn density_rounds_to_nearest_percent() {
        assert_eq!(density_percent(2, 6), 33);
        assert_eq!(density_percent(1, 2), 50);
        assert_eq!(density_percent(2, 3), 67);
        assert_eq!(density_percent(3, 0), 0);
    }
}
