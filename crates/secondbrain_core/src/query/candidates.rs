//! Link candidate filtering for "pick something to link" lists.

use crate::model::entity::{Entity, EntityId, EntityType};
use crate::model::snapshot::GraphSnapshot;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Type filter offered by selection UIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemTypeFilter {
    #[default]
    All,
    Note,
    Idea,
    Task,
}

impl ItemTypeFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Note => "note",
            Self::Idea => "idea",
            Self::Task => "task",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Some(Self::All),
            "note" => Some(Self::Note),
            "idea" => Some(Self::Idea),
            "task" => Some(Self::Task),
            _ => None,
        }
    }

    /// Entity types covered by this filter.
    pub fn types(self) -> &'static [EntityType] {
        match self {
            Self::All => &EntityType::ALL,
            Self::Note => &[EntityType::Note],
            Self::Idea => &[EntityType::Idea],
            Self::Task => &[EntityType::Task],
        }
    }
}

/// Entities of one collection that are active, not in `exclude_ids`, and
/// match `search_text` on title or content.
///
/// Matching is a case-insensitive substring test after collapsing
/// whitespace; blank search text matches everything. The returned iterator
/// is lazy and can be cloned to restart it.
pub fn candidates_excluding<'a>(
    all: &'a [Entity],
    exclude_ids: &'a BTreeSet<EntityId>,
    search_text: &str,
) -> impl Iterator<Item = &'a Entity> + Clone + 'a {
    let needle = normalize_search_text(search_text);
    all.iter().filter(move |entity| {
        entity.is_active() && !exclude_ids.contains(&entity.id) && matches_search(entity, &needle)
    })
}

/// Candidates across every type selected by `filter`, in type order.
pub fn candidates_for_filter<'a>(
    snapshot: &'a GraphSnapshot,
    filter: ItemTypeFilter,
    exclude_ids: &'a BTreeSet<EntityId>,
    search_text: &str,
) -> impl Iterator<Item = &'a Entity> + Clone + 'a {
    let needle = search_text.to_string();
    filter.types().iter().flat_map(move |kind| {
        candidates_excluding(snapshot.entities(*kind), exclude_ids, &needle)
    })
}

fn matches_search(entity: &Entity, needle: &str) -> bool {
    needle.is_empty()
        || normalize_search_text(&entity.title).contains(needle)
        || normalize_search_text(&entity.content).contains(needle)
}

fn normalize_search_text(value: &str) -> String {
    WHITESPACE_RE
        .replace_all(value.trim(), " ")
        .to_lowercase()
}
