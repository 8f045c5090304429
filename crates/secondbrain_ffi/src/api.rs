//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose link-graph use cases (connect, disconnect, stats, candidates)
//!   to Dart via FRB.
//! - Translate typed core errors into flat response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Ids and types cross the boundary as strings and are parsed here.
//! - Every DB-backed call opens the database at the resolved path.

use log::warn;
use secondbrain_core::db::open_db;
use secondbrain_core::{
    analyze, candidates_for_filter, compute_already_linked_ids,
    core_version as core_version_inner, init_logging as init_logging_inner, linked_view,
    load_snapshot, ping as ping_inner, AnalyticsOptions, Entity, EntityId, EntityStore,
    EntityStores, EntityType, ItemTypeFilter, LinkError, LinkOutcome, LinkRequest, LinkService,
    LinkType, SqliteStores,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const CANDIDATE_DEFAULT_LIMIT: u32 = 20;
const CANDIDATE_LIMIT_MAX: u32 = 50;
const GRAPH_DB_FILE_NAME: &str = "secondbrain_graph.sqlite3";
static GRAPH_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Result envelope for connect/disconnect/repair calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Stable error code (`target_not_found`, `partial_link_failure`, ...).
    pub error_code: Option<String>,
    /// Number of directional edges written.
    pub writes: u32,
    /// True when a one-directional link was left behind and can be repaired
    /// with `link_repair`.
    pub needs_repair: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl LinkActionResponse {
    fn success(message: impl Into<String>, writes: usize) -> Self {
        Self {
            ok: true,
            error_code: None,
            writes: u32::try_from(writes).unwrap_or(u32::MAX),
            needs_repair: false,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_code: None,
            writes: 0,
            needs_repair: false,
            message: message.into(),
        }
    }

    fn from_link_error(operation: &str, err: &LinkError) -> Self {
        let partial = err.pending_write().is_some();
        Self {
            ok: false,
            error_code: Some(err.code().to_string()),
            writes: u32::from(partial),
            needs_repair: partial,
            message: format!("{operation} failed: {err}"),
        }
    }
}

/// Graph statistics projection for visualization screens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStatsResponse {
    pub ok: bool,
    pub message: String,
    pub total_entities: u32,
    pub total_connections: u32,
    pub connection_density: u32,
    pub cluster_count: u32,
    pub largest_cluster_size: u32,
    pub isolated_notes: u32,
    pub isolated_ideas: u32,
    pub isolated_tasks: u32,
    pub isolated_reminders: u32,
    pub recent_connections_week: u32,
    pub recent_connections_month: u32,
    /// `type:uuid` of the highest-degree entity.
    pub most_connected: Option<String>,
}

/// One selectable entity in a link picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidateItem {
    pub id: String,
    /// Entity type (`note|idea|task|reminder`).
    pub kind: String,
    pub title: String,
}

/// Candidate list envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidatesResponse {
    pub items: Vec<LinkCandidateItem>,
    pub message: String,
    /// Effective applied candidate limit.
    pub applied_limit: u32,
}

/// Connects two entities in both directions.
///
/// Input semantics:
/// - `link_type`: `default|related|reference|child|parent`; blank or `None`
///   means `default`.
/// - `strict`: report `already_linked` instead of succeeding silently.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - A repeated connect succeeds with `writes == 0` unless `strict` is set.
#[flutter_rust_bridge::frb(sync)]
pub fn link_connect(
    source_id: String,
    source_type: String,
    target_id: String,
    target_type: String,
    link_type: Option<String>,
    description: Option<String>,
    strict: bool,
) -> LinkActionResponse {
    let request = match parse_request(&source_id, &source_type, &target_id, &target_type) {
        Ok(request) => request,
        Err(message) => {
            return LinkActionResponse::failure(format!("link_connect failed: {message}"));
        }
    };
    let link_type = match link_type.as_deref().map(LinkType::parse) {
        None => LinkType::Default,
        Some(Some(parsed)) => parsed,
        Some(None) => {
            return LinkActionResponse::failure("link_connect failed: unsupported link_type");
        }
    };

    let mut request = request.with_link_type(link_type);
    if let Some(description) = description.filter(|text| !text.trim().is_empty()) {
        request = request.with_description(description.trim());
    }
    if strict {
        request = request.strict();
    }

    with_link_service("link_connect", |service| service.connect(&request))
}

/// Removes the link between two entities in both directions.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Removing a link that does not exist succeeds with `writes == 0`.
#[flutter_rust_bridge::frb(sync)]
pub fn link_disconnect(
    source_id: String,
    source_type: String,
    target_id: String,
    target_type: String,
) -> LinkActionResponse {
    match parse_request(&source_id, &source_type, &target_id, &target_type) {
        Ok(request) => with_link_service("link_disconnect", |service| service.disconnect(&request)),
        Err(message) => LinkActionResponse::failure(format!("link_disconnect failed: {message}")),
    }
}

/// Writes every missing reciprocal edge in the database.
///
/// Used after a `needs_repair` response or as a maintenance action.
#[flutter_rust_bridge::frb(sync)]
pub fn link_repair() -> LinkActionResponse {
    let result = with_stores(|stores| {
        LinkService::new(stores)
            .repair_asymmetric()
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(0) => LinkActionResponse::success("Links are symmetric.", 0),
        Ok(written) => LinkActionResponse::success(format!("Repaired {written} link(s)."), written),
        Err(err) => LinkActionResponse::failure(format!("link_repair failed: {err}")),
    }
}

/// Computes graph statistics over every stored entity.
///
/// # FFI contract
/// - Sync call; cost grows with entity and edge count.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn graph_stats() -> GraphStatsResponse {
    let result = with_stores(|stores| load_snapshot(stores).map_err(|err| err.to_string()));
    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(err) => {
            return GraphStatsResponse {
                message: format!("graph_stats failed: {err}"),
                ..GraphStatsResponse::default()
            };
        }
    };

    let stats = analyze(&snapshot, &AnalyticsOptions::default());
    GraphStatsResponse {
        ok: true,
        message: format!("{} entities analyzed.", stats.total_entities),
        total_entities: to_u32(stats.total_entities),
        total_connections: to_u32(stats.total_connections),
        connection_density: stats.connection_density,
        cluster_count: to_u32(stats.cluster_count),
        largest_cluster_size: to_u32(stats.largest_cluster_size),
        isolated_notes: to_u32(stats.isolated_notes),
        isolated_ideas: to_u32(stats.isolated_ideas),
        isolated_tasks: to_u32(stats.isolated_tasks),
        isolated_reminders: to_u32(stats.isolated_reminders),
        recent_connections_week: to_u32(stats.recent_connections_week),
        recent_connections_month: to_u32(stats.recent_connections_month),
        most_connected: stats.most_connected.map(|key| key.to_string()),
    }
}

/// Lists entities that can still be linked to `entity_id`.
///
/// Input semantics:
/// - `filter`: `all|note|idea|task`; blank means `all`.
/// - `search_text`: case-insensitive substring on title or content.
/// - `limit`: `None` or `0` uses the default; values above the max clamp.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - The entity itself and everything it already links to are excluded.
#[flutter_rust_bridge::frb(sync)]
pub fn link_candidates(
    entity_id: String,
    entity_type: String,
    filter: String,
    search_text: String,
    limit: Option<u32>,
) -> LinkCandidatesResponse {
    let applied_limit = normalize_candidate_limit(limit);
    let failure = |message: String| LinkCandidatesResponse {
        items: Vec::new(),
        message: format!("link_candidates failed: {message}"),
        applied_limit,
    };

    let (id, kind) = match parse_endpoint(&entity_id, &entity_type) {
        Ok(endpoint) => endpoint,
        Err(message) => return failure(message),
    };
    let Some(filter) = ItemTypeFilter::parse(&filter) else {
        return failure(format!("unsupported filter `{}`", filter.trim()));
    };

    let result = with_stores(|stores| {
        let entity = require_entity(stores, id, kind)?;
        let snapshot = load_snapshot(stores).map_err(|err| err.to_string())?;
        let types: BTreeSet<EntityType> = filter.types().iter().copied().collect();
        let mut exclude = compute_already_linked_ids(&entity, &types);
        exclude.insert(entity.id);

        let items = candidates_for_filter(&snapshot, filter, &exclude, &search_text)
            .take(applied_limit as usize)
            .map(to_candidate_item)
            .collect::<Vec<_>>();
        Ok(items)
    });

    match result {
        Ok(items) => {
            let message = if items.is_empty() {
                "No candidates.".to_string()
            } else {
                format!("Found {} candidate(s).", items.len())
            };
            LinkCandidatesResponse {
                items,
                message,
                applied_limit,
            }
        }
        Err(message) => failure(message),
    }
}

/// Lists live entities linked from `entity_id`, grouped in type order.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Dangling edges are skipped.
#[flutter_rust_bridge::frb(sync)]
pub fn linked_items(entity_id: String, entity_type: String) -> LinkCandidatesResponse {
    let result = parse_endpoint(&entity_id, &entity_type).and_then(|(id, kind)| {
        with_stores(|stores| {
            let entity = require_entity(stores, id, kind)?;
            let view = linked_view(&entity, stores).map_err(|err| err.to_string())?;
            let items = EntityType::ALL
                .into_iter()
                .flat_map(|kind| view.of_type(kind).iter())
                .map(to_candidate_item)
                .collect::<Vec<_>>();
            Ok(items)
        })
    });

    match result {
        Ok(items) => LinkCandidatesResponse {
            message: format!("Found {} linked item(s).", items.len()),
            applied_limit: to_u32(items.len()),
            items,
        },
        Err(message) => LinkCandidatesResponse {
            items: Vec::new(),
            message: format!("linked_items failed: {message}"),
            applied_limit: 0,
        },
    }
}

fn normalize_candidate_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => CANDIDATE_DEFAULT_LIMIT,
        Some(value) if value > CANDIDATE_LIMIT_MAX => CANDIDATE_LIMIT_MAX,
        Some(value) => value,
    }
}

fn resolve_graph_db_path() -> PathBuf {
    GRAPH_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("SECONDBRAIN_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(GRAPH_DB_FILE_NAME)
        })
        .clone()
}

fn with_stores<T>(f: impl FnOnce(&SqliteStores<'_>) -> Result<T, String>) -> Result<T, String> {
    let db_path = resolve_graph_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("graph DB open failed: {err}"))?;
    let stores =
        SqliteStores::try_new(&conn).map_err(|err| format!("graph store init failed: {err}"))?;
    f(&stores)
}

fn with_link_service(
    operation: &str,
    f: impl FnOnce(&LinkService<&SqliteStores<'_>>) -> Result<LinkOutcome, LinkError>,
) -> LinkActionResponse {
    let result = with_stores(|stores| Ok(f(&LinkService::new(stores))));
    match result {
        Ok(Ok(outcome)) => {
            let writes = outcome.saga.writes();
            let message = if outcome.saga.is_noop() {
                "Nothing to change."
            } else {
                "Link updated."
            };
            LinkActionResponse::success(message, writes)
        }
        Ok(Err(err)) => {
            if err.pending_write().is_some() {
                warn!("event=ffi_link module=ffi status=partial operation={operation}");
            }
            LinkActionResponse::from_link_error(operation, &err)
        }
        Err(message) => LinkActionResponse::failure(format!("{operation} failed: {message}")),
    }
}

fn require_entity(
    stores: &SqliteStores<'_>,
    id: EntityId,
    kind: EntityType,
) -> Result<Entity, String> {
    stores
        .store(kind)
        .find_by_id(id)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("{kind} {id} not found"))
}

fn parse_request(
    source_id: &str,
    source_type: &str,
    target_id: &str,
    target_type: &str,
) -> Result<LinkRequest, String> {
    let (source_id, source_type) = parse_endpoint(source_id, source_type)?;
    let (target_id, target_type) = parse_endpoint(target_id, target_type)?;
    Ok(LinkRequest::new(
        source_id,
        source_type,
        target_id,
        target_type,
    ))
}

fn parse_endpoint(id: &str, kind: &str) -> Result<(EntityId, EntityType), String> {
    let id = Uuid::parse_str(id.trim()).map_err(|_| format!("invalid id `{}`", id.trim()))?;
    let kind =
        EntityType::parse(kind).ok_or_else(|| format!("unsupported type `{}`", kind.trim()))?;
    Ok((id, kind))
}

fn to_candidate_item(entity: &Entity) -> LinkCandidateItem {
    LinkCandidateItem {
        id: entity.id.to_string(),
        kind: entity.kind.as_str().to_string(),
        title: entity.title.clone(),
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, graph_stats, init_logging, link_candidates, link_connect, link_disconnect,
        link_repair, linked_items, normalize_candidate_limit, ping,
    };
    use secondbrain_core::db::open_db;
    use secondbrain_core::{Entity, EntityType, SqliteStores};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn candidate_limit_is_normalized() {
        assert_eq!(normalize_candidate_limit(None), 20);
        assert_eq!(normalize_candidate_limit(Some(0)), 20);
        assert_eq!(normalize_candidate_limit(Some(500)), 50);
        assert_eq!(normalize_candidate_limit(Some(5)), 5);
    }

    #[test]
    fn connect_rejects_malformed_input_without_touching_db() {
        let response = link_connect(
            "not-a-uuid".to_string(),
            "note".to_string(),
            uuid::Uuid::new_v4().to_string(),
            "idea".to_string(),
            None,
            None,
            false,
        );
        assert!(!response.ok);
        assert!(response.message.contains("invalid id"));

        let response = link_connect(
            uuid::Uuid::new_v4().to_string(),
            "event".to_string(),
            uuid::Uuid::new_v4().to_string(),
            "idea".to_string(),
            None,
            None,
            false,
        );
        assert!(response.message.contains("unsupported type"));
    }

    #[test]
    fn connect_candidates_and_disconnect_flow() {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let note = Entity::new(EntityType::Note, format!("note {token}"));
        let idea = Entity::new(EntityType::Idea, format!("idea {token}"));
        let other = Entity::new(EntityType::Idea, format!("other {token}"));
        seed(&[&note, &idea, &other]);

        let connected = link_connect(
            note.id.to_string(),
            "note".to_string(),
            idea.id.to_string(),
            "idea".to_string(),
            Some("reference".to_string()),
            Some("  source  ".to_string()),
            false,
        );
        assert!(connected.ok, "{}", connected.message);
        assert_eq!(connected.writes, 2);

        let strict = link_connect(
            note.id.to_string(),
            "note".to_string(),
            idea.id.to_string(),
            "idea".to_string(),
            None,
            None,
            true,
        );
        assert!(!strict.ok);
        assert_eq!(strict.error_code.as_deref(), Some("already_linked"));

        let candidates = link_candidates(
            note.id.to_string(),
            "note".to_string(),
            "idea".to_string(),
            token.clone(),
            Some(500),
        );
        assert_eq!(candidates.applied_limit, 50);
        assert_eq!(candidates.items.len(), 1);
        assert_eq!(candidates.items[0].id, other.id.to_string());

        let linked = linked_items(idea.id.to_string(), "idea".to_string());
        assert_eq!(linked.items.len(), 1);
        assert_eq!(linked.items[0].id, note.id.to_string());

        let stats = graph_stats();
        assert!(stats.ok, "{}", stats.message);
        assert!(stats.total_connections >= 1);

        let disconnected = link_disconnect(
            idea.id.to_string(),
            "idea".to_string(),
            note.id.to_string(),
            "note".to_string(),
        );
        assert!(disconnected.ok, "{}", disconnected.message);
        assert_eq!(disconnected.writes, 2);

        let repair = link_repair();
        assert!(repair.ok, "{}", repair.message);
    }

    #[test]
    fn connect_reports_missing_target_code() {
        let note = Entity::new(EntityType::Note, "lonely");
        seed(&[&note]);

        let response = link_connect(
            note.id.to_string(),
            "note".to_string(),
            uuid::Uuid::new_v4().to_string(),
            "task".to_string(),
            None,
            None,
            false,
        );
        assert!(!response.ok);
        assert_eq!(response.error_code.as_deref(), Some("target_not_found"));
        assert!(!response.needs_repair);
    }

    fn seed(entities: &[&Entity]) {
        let conn = open_db(super::resolve_graph_db_path()).expect("open db");
        let stores = SqliteStores::try_new(&conn).expect("stores");
        for entity in entities {
            stores.create_entity(entity).expect("seed entity");
        }
    }
}
