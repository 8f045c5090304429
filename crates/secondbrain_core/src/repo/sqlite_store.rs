//! SQLite-backed entity stores.
//!
//! # Responsibility
//! - Persist items, tags and per-owner edge lists in the `items`,
//!   `item_tags` and `item_links` tables.
//! - Implement `EntityStore` for one entity type per store instance.
//!
//! # Invariants
//! - All reads and writes are constrained to the store's own `type`.
//! - Edge lists keep insertion order (`item_links.position`).
//! - Soft-deleted rows are invisible to `find_by_id`/`list` and reject
//!   link writes with `NotFound`.

use crate::db::ensure_current_schema;
use crate::link::registry::already_linked;
use crate::model::entity::{now_epoch_ms, Entity, EntityId, EntityType};
use crate::model::link::{Edge, EdgeTarget, LinkType};
use crate::repo::entity_store::{EntityStore, EntityStores, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    type,
    title,
    content,
    is_archived,
    is_deleted,
    created_at,
    updated_at
FROM items";

const LINK_SELECT_SQL: &str = "SELECT
    item_links.owner_uuid AS owner_uuid,
    item_links.target_uuid AS target_uuid,
    item_links.target_type AS target_type,
    item_links.shape AS shape,
    item_links.link_type AS link_type,
    item_links.description AS description,
    item_links.created_at AS created_at
FROM item_links
JOIN items ON items.uuid = item_links.owner_uuid";

/// Entity store for one type over a migrated SQLite connection.
pub struct SqliteEntityStore<'conn> {
    conn: &'conn Connection,
    kind: EntityType,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Constructs a store after verifying the schema is current.
    pub fn try_new(conn: &'conn Connection, kind: EntityType) -> RepoResult<Self> {
        ensure_current_schema(conn)?;
        Ok(Self { conn, kind })
    }

    /// Inserts a new entity including its tags and edges.
    pub fn create_entity(&self, entity: &Entity) -> RepoResult<EntityId> {
        self.ensure_kind(entity)?;
        entity.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO items (
                uuid,
                type,
                title,
                content,
                is_archived,
                is_deleted,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                entity.id.to_string(),
                entity.kind.as_str(),
                entity.title.as_str(),
                entity.content.as_str(),
                bool_to_int(entity.is_archived),
                bool_to_int(entity.is_deleted),
                entity.created_at,
                entity.updated_at,
            ],
        )?;
        for tag in &entity.tags {
            tx.execute(
                "INSERT OR IGNORE INTO item_tags (item_uuid, tag) VALUES (?1, ?2);",
                params![entity.id.to_string(), tag.as_str()],
            )?;
        }
        for edge in &entity.edges {
            insert_edge_row(&tx, entity.id, edge)?;
        }
        tx.commit()?;

        Ok(entity.id)
    }

    /// Soft-deletes an entity. Its own edges stay; edges pointing at it
    /// become dangling.
    pub fn soft_delete(&self, id: EntityId) -> RepoResult<()> {
        self.set_flag("is_deleted", id)
    }

    /// Archives an entity; archived entities stay readable but cannot take
    /// new links.
    pub fn archive(&self, id: EntityId) -> RepoResult<()> {
        self.set_flag("is_archived", id)
    }

    fn set_flag(&self, column: &'static str, id: EntityId) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE items
                 SET {column} = 1, updated_at = MAX(created_at, ?3)
                 WHERE uuid = ?1 AND type = ?2 AND is_deleted = 0;"
            ),
            params![id.to_string(), self.kind.as_str(), now_epoch_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn ensure_kind(&self, entity: &Entity) -> RepoResult<()> {
        if entity.kind != self.kind {
            return Err(RepoError::InvalidData(format!(
                "{} store cannot accept a {} entity",
                self.kind, entity.kind
            )));
        }
        Ok(())
    }

    fn require(&self, id: EntityId) -> RepoResult<Entity> {
        self.find_by_id(id)?.ok_or(RepoError::NotFound(id))
    }

    fn touch(conn: &Connection, id: EntityId) -> RepoResult<()> {
        conn.execute(
            "UPDATE items SET updated_at = MAX(created_at, ?2) WHERE uuid = ?1;",
            params![id.to_string(), now_epoch_ms()],
        )?;
        Ok(())
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn kind(&self) -> EntityType {
        self.kind
    }

    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<Entity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE uuid = ?1 AND type = ?2 AND is_deleted = 0;"
        ))?;
        let Some(mut entity) = stmt
            .query_row(params![id.to_string(), self.kind.as_str()], |row| {
                Ok(parse_item_row(row))
            })
            .optional()?
            .transpose()?
        else {
            return Ok(None);
        };

        let owner = id.to_string();
        entity.tags = load_tags(self.conn, Some(owner.as_str()), self.kind)?
            .remove(&id)
            .unwrap_or_default();
        entity.edges = load_edges(self.conn, Some(owner.as_str()), self.kind)?
            .remove(&id)
            .unwrap_or_default();
        entity.validate()?;
        Ok(Some(entity))
    }

    fn list(&self) -> RepoResult<Vec<Entity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE type = ?1 AND is_deleted = 0
             ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([self.kind.as_str()])?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_item_row(row)?);
        }

        let mut tags = load_tags(self.conn, None, self.kind)?;
        let mut edges = load_edges(self.conn, None, self.kind)?;
        for entity in &mut entities {
            entity.tags = tags.remove(&entity.id).unwrap_or_default();
            entity.edges = edges.remove(&entity.id).unwrap_or_default();
            entity.validate()?;
        }
        Ok(entities)
    }

    fn persist_link_add(&self, entity_id: EntityId, edge: &Edge) -> RepoResult<Entity> {
        let entity = self.require(entity_id)?;
        if already_linked(&entity, edge.target_id(), edge.target_type()) {
            return Ok(entity);
        }

        let mut candidate = entity;
        candidate.edges.push(edge.clone());
        candidate.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        insert_edge_row(&tx, entity_id, edge)?;
        Self::touch(&tx, entity_id)?;
        tx.commit()?;

        self.require(entity_id)
    }

    fn persist_link_remove(
        &self,
        entity_id: EntityId,
        target_id: EntityId,
        target_type: EntityType,
    ) -> RepoResult<Entity> {
        let entity = self.require(entity_id)?;
        if !already_linked(&entity, target_id, target_type) {
            return Ok(entity);
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM item_links
             WHERE owner_uuid = ?1 AND target_uuid = ?2 AND target_type = ?3;",
            params![
                entity_id.to_string(),
                target_id.to_string(),
                target_type.as_str()
            ],
        )?;
        Self::touch(&tx, entity_id)?;
        tx.commit()?;

        self.require(entity_id)
    }

    fn persist_mirror_add(
        &self,
        first: EntityId,
        second: EntityId,
        link_type: LinkType,
        created_at: i64,
    ) -> RepoResult<Option<(Entity, Entity)>> {
        if self.kind != EntityType::Note {
            return Err(RepoError::InvalidData(format!(
                "mirrored plain-id links are only stored for notes, not {}",
                self.kind
            )));
        }
        let first_entity = self.require(first)?;
        let second_entity = self.require(second)?;

        let tx = self.conn.unchecked_transaction()?;
        if !already_linked(&first_entity, second, self.kind) {
            insert_edge_row(&tx, first, &Edge::plain(second, link_type, Some(created_at)))?;
            Self::touch(&tx, first)?;
        }
        if !already_linked(&second_entity, first, self.kind) {
            insert_edge_row(&tx, second, &Edge::plain(first, link_type, Some(created_at)))?;
            Self::touch(&tx, second)?;
        }
        tx.commit()?;

        Ok(Some((self.require(first)?, self.require(second)?)))
    }
}

/// The four per-type SQLite stores over one connection.
pub struct SqliteStores<'conn> {
    notes: SqliteEntityStore<'conn>,
    ideas: SqliteEntityStore<'conn>,
    tasks: SqliteEntityStore<'conn>,
    reminders: SqliteEntityStore<'conn>,
}

impl<'conn> SqliteStores<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self {
            notes: SqliteEntityStore::try_new(conn, EntityType::Note)?,
            ideas: SqliteEntityStore::try_new(conn, EntityType::Idea)?,
            tasks: SqliteEntityStore::try_new(conn, EntityType::Task)?,
            reminders: SqliteEntityStore::try_new(conn, EntityType::Reminder)?,
        })
    }

    /// Concrete store for `kind`, exposing store-specific helpers.
    pub fn sqlite(&self, kind: EntityType) -> &SqliteEntityStore<'conn> {
        match kind {
            EntityType::Note => &self.notes,
            EntityType::Idea => &self.ideas,
            EntityType::Task => &self.tasks,
            EntityType::Reminder => &self.reminders,
        }
    }

    /// Inserts an entity through the store owning its type.
    pub fn create_entity(&self, entity: &Entity) -> RepoResult<EntityId> {
        self.sqlite(entity.kind).create_entity(entity)
    }
}

impl EntityStores for SqliteStores<'_> {
    fn store(&self, kind: EntityType) -> &dyn EntityStore {
        self.sqlite(kind)
    }
}

fn insert_edge_row(conn: &Connection, owner: EntityId, edge: &Edge) -> RepoResult<()> {
    let (shape, description) = match &edge.target {
        EdgeTarget::PlainId { .. } => ("plain_id", None),
        EdgeTarget::TypedTuple { description, .. } => ("typed_tuple", description.as_deref()),
    };
    conn.execute(
        "INSERT OR IGNORE INTO item_links (
            owner_uuid,
            target_uuid,
            target_type,
            shape,
            link_type,
            description,
            created_at,
            position
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            (SELECT COALESCE(MAX(position), -1) + 1 FROM item_links WHERE owner_uuid = ?1)
        );",
        params![
            owner.to_string(),
            edge.target_id().to_string(),
            edge.target_type().as_str(),
            shape,
            edge.link_type.as_str(),
            description,
            edge.created_at,
        ],
    )?;
    Ok(())
}

fn load_tags(
    conn: &Connection,
    owner: Option<&str>,
    kind: EntityType,
) -> RepoResult<BTreeMap<EntityId, BTreeSet<String>>> {
    let mut stmt = conn.prepare(
        "SELECT item_tags.item_uuid AS item_uuid, item_tags.tag AS tag
         FROM item_tags
         JOIN items ON items.uuid = item_tags.item_uuid
         WHERE items.type = ?1
           AND (?2 IS NULL OR item_tags.item_uuid = ?2)
         ORDER BY item_tags.tag ASC;",
    )?;
    let mut rows = stmt.query(params![kind.as_str(), owner])?;
    let mut tags: BTreeMap<EntityId, BTreeSet<String>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let item_uuid: String = row.get("item_uuid")?;
        tags.entry(parse_uuid(&item_uuid, "item_tags.item_uuid")?)
            .or_default()
            .insert(row.get("tag")?);
    }
    Ok(tags)
}

fn load_edges(
    conn: &Connection,
    owner: Option<&str>,
    kind: EntityType,
) -> RepoResult<BTreeMap<EntityId, Vec<Edge>>> {
    let mut stmt = conn.prepare(&format!(
        "{LINK_SELECT_SQL}
         WHERE items.type = ?1
           AND (?2 IS NULL OR item_links.owner_uuid = ?2)
         ORDER BY item_links.owner_uuid ASC, item_links.position ASC;"
    ))?;
    let mut rows = stmt.query(params![kind.as_str(), owner])?;
    let mut edges: BTreeMap<EntityId, Vec<Edge>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let owner_uuid: String = row.get("owner_uuid")?;
        edges
            .entry(parse_uuid(&owner_uuid, "item_links.owner_uuid")?)
            .or_default()
            .push(parse_edge_row(row)?);
    }
    Ok(edges)
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Entity> {
    let uuid_text: String = row.get("uuid")?;
    let type_text: String = row.get("type")?;
    let kind = EntityType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid item type `{type_text}` in items.type"))
    })?;

    Ok(Entity {
        id: parse_uuid(&uuid_text, "items.uuid")?,
        kind,
        title: row.get("title")?,
        content: row.get("content")?,
        tags: BTreeSet::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        is_archived: int_to_bool(row.get("is_archived")?, "items.is_archived")?,
        is_deleted: int_to_bool(row.get("is_deleted")?, "items.is_deleted")?,
        edges: Vec::new(),
    })
}

fn parse_edge_row(row: &Row<'_>) -> RepoResult<Edge> {
    let target_text: String = row.get("target_uuid")?;
    let target_id = parse_uuid(&target_text, "item_links.target_uuid")?;

    let type_text: String = row.get("target_type")?;
    let target_type = EntityType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid target type `{type_text}` in item_links.target_type"
        ))
    })?;

    let link_text: String = row.get("link_type")?;
    let link_type = LinkType::parse(&link_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid link type `{link_text}` in item_links.link_type"
        ))
    })?;
    let created_at: Option<i64> = row.get("created_at")?;

    let shape: String = row.get("shape")?;
    match shape.as_str() {
        "plain_id" if target_type == EntityType::Note => {
            Ok(Edge::plain(target_id, link_type, created_at))
        }
        "plain_id" => Err(RepoError::InvalidData(format!(
            "plain_id edge must target a note, found `{type_text}`"
        ))),
        "typed_tuple" => Ok(Edge::typed(
            target_id,
            target_type,
            row.get("description")?,
            link_type,
            created_at,
        )),
        other => Err(RepoError::InvalidData(format!(
            "invalid edge shape `{other}` in item_links.shape"
        ))),
    }
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
