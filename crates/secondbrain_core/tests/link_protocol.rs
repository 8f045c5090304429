use secondbrain_core::db::open_db_in_memory;
use secondbrain_core::{
    linked_view, Edge, EdgeTarget, Entity, EntityId, EntityStore, EntityStores, EntityType,
    LinkError, LinkMutation, LinkRequest, LinkService, LinkType, NodeKey, RepoError, RepoResult,
    SqliteEntityStore, SqliteStores,
};
use std::cell::Cell;

fn seed(stores: &SqliteStores<'_>, kind: EntityType, title: &str) -> Entity {
    let entity = Entity::new(kind, title);
    stores.create_entity(&entity).unwrap();
    entity
}

fn reload(stores: &SqliteStores<'_>, entity: &Entity) -> Entity {
    stores
        .store(entity.kind)
        .find_by_id(entity.id)
        .unwrap()
        .unwrap()
}

fn request(source: &Entity, target: &Entity) -> LinkRequest {
    LinkRequest::new(source.id, source.kind, target.id, target.kind)
}

#[test]
fn note_to_idea_connect_writes_typed_edges_on_both_sides() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let note = seed(&stores, EntityType::Note, "N1");
    let idea = seed(&stores, EntityType::Idea, "I1");
    let service = LinkService::new(&stores);

    let outcome = service.connect(&request(&note, &idea)).unwrap();
    assert_eq!(outcome.saga.writes(), 2);

    let note_after = reload(&stores, &note);
    assert_eq!(note_after.edges.len(), 1);
    assert!(matches!(
        note_after.edges[0].target,
        EdgeTarget::TypedTuple { id, kind: EntityType::Idea, .. } if id == idea.id
    ));
    assert_eq!(note_after.edges[0].link_type, LinkType::Default);

    let idea_after = reload(&stores, &idea);
    assert_eq!(idea_after.edges.len(), 1);
    assert!(matches!(
        idea_after.edges[0].target,
        EdgeTarget::TypedTuple { id, kind: EntityType::Note, .. } if id == note.id
    ));

    service.disconnect(&request(&note, &idea)).unwrap();
    assert!(reload(&stores, &note).edges.is_empty());
    assert!(reload(&stores, &idea).edges.is_empty());
}

#[test]
fn note_to_note_connect_mirrors_plain_ids() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let first = seed(&stores, EntityType::Note, "first");
    let second = seed(&stores, EntityType::Note, "second");
    let service = LinkService::new(&stores);

    let outcome = service
        .connect(&request(&first, &second).with_link_type(LinkType::Related))
        .unwrap();
    assert!(outcome.saga.primary_written && outcome.saga.secondary_written);

    let first_after = reload(&stores, &first);
    let second_after = reload(&stores, &second);
    assert_eq!(
        first_after.edges[0].target,
        EdgeTarget::PlainId { id: second.id }
    );
    assert_eq!(
        second_after.edges[0].target,
        EdgeTarget::PlainId { id: first.id }
    );
    assert_eq!(second_after.edges[0].link_type, LinkType::Related);
}

#[test]
fn every_type_pair_connects_symmetrically() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let service = LinkService::new(&stores);

    for source_kind in EntityType::ALL {
        for target_kind in EntityType::ALL {
            let source = seed(&stores, source_kind, "source");
            let target = seed(&stores, target_kind, "target");

            let outcome = service
                .connect(&request(&source, &target).with_description("why"))
                .unwrap();
            let target_after = outcome.target.expect("connect returns the target");

            assert!(
                secondbrain_core::already_linked(&outcome.source, target.id, target_kind),
                "{source_kind} -> {target_kind} missing forward edge"
            );
            assert!(
                secondbrain_core::already_linked(&target_after, source.id, source_kind),
                "{source_kind} -> {target_kind} missing reciprocal edge"
            );

            let source_view = linked_view(&outcome.source, &stores).unwrap();
            assert!(
                source_view.contains(NodeKey::new(target.id, target_kind)),
                "{source_kind} -> {target_kind} target missing from source view"
            );
            let target_view = linked_view(&target_after, &stores).unwrap();
            assert!(
                target_view.contains(NodeKey::new(source.id, source_kind)),
                "{source_kind} -> {target_kind} source missing from target view"
            );
        }
    }
}

#[test]
fn task_edges_carry_description() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let task = seed(&stores, EntityType::Task, "ship it");
    let idea = seed(&stores, EntityType::Idea, "better release flow");
    let service = LinkService::new(&stores);

    service
        .connect(&request(&task, &idea).with_description("implements"))
        .unwrap();

    let task_after = reload(&stores, &task);
    assert_eq!(task_after.edges[0].description(), Some("implements"));
    assert!(task_after.edges[0].created_at.is_some());
}

#[test]
fn connect_twice_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let idea = seed(&stores, EntityType::Idea, "idea");
    let task = seed(&stores, EntityType::Task, "task");
    let service = LinkService::new(&stores);

    service.connect(&request(&idea, &task)).unwrap();
    let idea_once = reload(&stores, &idea).edges;
    let task_once = reload(&stores, &task).edges;

    let second = service.connect(&request(&idea, &task)).unwrap();
    assert!(second.saga.is_noop());
    assert_eq!(reload(&stores, &idea).edges, idea_once);
    assert_eq!(reload(&stores, &task).edges, task_once);

    let reversed = service.connect(&request(&task, &idea)).unwrap();
    assert!(reversed.saga.is_noop());
    assert_eq!(reload(&stores, &idea).edges.len(), 1);
}

#[test]
fn strict_connect_reports_already_linked() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let note = seed(&stores, EntityType::Note, "note");
    let reminder = seed(&stores, EntityType::Reminder, "reminder");
    let service = LinkService::new(&stores);

    service.connect(&request(&note, &reminder).strict()).unwrap();
    let err = service
        .connect(&request(&note, &reminder).strict())
        .unwrap_err();
    assert!(matches!(err, LinkError::AlreadyLinked { .. }));
    assert!(err.is_validation());
}

#[test]
fn self_link_fails_without_touching_edges() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let idea = seed(&stores, EntityType::Idea, "idea");
    let service = LinkService::new(&stores);

    let err = service.connect(&request(&idea, &idea)).unwrap_err();
    assert!(matches!(err, LinkError::InvalidSelfLink(id) if id == idea.id));
    assert!(reload(&stores, &idea).edges.is_empty());
}

#[test]
fn missing_or_inactive_endpoints_are_rejected_before_writes() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let note = seed(&stores, EntityType::Note, "note");
    let archived = seed(&stores, EntityType::Idea, "archived");
    stores.sqlite(EntityType::Idea).archive(archived.id).unwrap();
    let ghost = Entity::new(EntityType::Task, "never stored");
    let service = LinkService::new(&stores);

    let err = service.connect(&request(&note, &ghost)).unwrap_err();
    assert!(matches!(
        err,
        LinkError::TargetNotFound { id, kind: EntityType::Task } if id == ghost.id
    ));

    let err = service.connect(&request(&note, &archived)).unwrap_err();
    assert!(matches!(err, LinkError::InactiveEndpoint { .. }));

    assert!(reload(&stores, &note).edges.is_empty());
}

#[test]
fn disconnect_restores_pre_connect_state() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let idea = seed(&stores, EntityType::Idea, "idea");
    let other = seed(&stores, EntityType::Idea, "other");
    let note = seed(&stores, EntityType::Note, "note");
    let service = LinkService::new(&stores);

    service.connect(&request(&idea, &note)).unwrap();
    let idea_before = reload(&stores, &idea).edges;
    let other_before = reload(&stores, &other).edges;

    service.connect(&request(&idea, &other)).unwrap();
    service.disconnect(&request(&other, &idea)).unwrap();

    assert_eq!(reload(&stores, &idea).edges, idea_before);
    assert_eq!(reload(&stores, &other).edges, other_before);
}

#[test]
fn disconnect_of_unlinked_pair_is_noop() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let note = seed(&stores, EntityType::Note, "a");
    let other = seed(&stores, EntityType::Note, "b");
    let service = LinkService::new(&stores);

    let outcome = service.disconnect(&request(&note, &other)).unwrap();
    assert!(outcome.saga.is_noop());
}

#[test]
fn disconnect_removes_dangling_edge_after_target_deletion() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let idea = seed(&stores, EntityType::Idea, "idea");
    let task = seed(&stores, EntityType::Task, "task");
    let service = LinkService::new(&stores);

    service.connect(&request(&idea, &task)).unwrap();
    stores.sqlite(EntityType::Task).soft_delete(task.id).unwrap();

    let outcome = service.disconnect(&request(&idea, &task)).unwrap();
    assert!(outcome.target.is_none());
    assert_eq!(outcome.saga.writes(), 1);
    assert!(reload(&stores, &idea).edges.is_empty());
}

struct FlakyStore<'conn> {
    inner: SqliteEntityStore<'conn>,
    fail_writes: Cell<bool>,
    writes_left: Cell<Option<usize>>,
}

impl FlakyStore<'_> {
    fn check(&self) -> RepoResult<()> {
        if self.fail_writes.get() {
            return Err(RepoError::Unavailable("network down".to_string()));
        }
        if let Some(left) = self.writes_left.get() {
            if left == 0 {
                return Err(RepoError::Unavailable("network down".to_string()));
            }
            self.writes_left.set(Some(left - 1));
        }
        Ok(())
    }
}

impl EntityStore for FlakyStore<'_> {
    fn kind(&self) -> EntityType {
        self.inner.kind()
    }

    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<Entity>> {
        self.inner.find_by_id(id)
    }

    fn list(&self) -> RepoResult<Vec<Entity>> {
        self.inner.list()
    }

    fn persist_link_add(&self, entity_id: EntityId, edge: &Edge) -> RepoResult<Entity> {
        self.check()?;
        self.inner.persist_link_add(entity_id, edge)
    }

    fn persist_link_remove(
        &self,
        entity_id: EntityId,
        target_id: EntityId,
        target_type: EntityType,
    ) -> RepoResult<Entity> {
        self.check()?;
        self.inner.persist_link_remove(entity_id, target_id, target_type)
    }
}

struct FlakyStores<'conn> {
    stores: Vec<FlakyStore<'conn>>,
}

impl<'conn> FlakyStores<'conn> {
    fn new(conn: &'conn rusqlite::Connection) -> Self {
        let stores = EntityType::ALL
            .into_iter()
            .map(|kind| FlakyStore {
                inner: SqliteEntityStore::try_new(conn, kind).unwrap(),
                fail_writes: Cell::new(false),
                writes_left: Cell::new(None),
            })
            .collect();
        Self { stores }
    }

    fn flaky(&self, kind: EntityType) -> &FlakyStore<'conn> {
        self.stores
            .iter()
            .find(|store| store.kind() == kind)
            .unwrap()
    }
}

impl EntityStores for FlakyStores<'_> {
    fn store(&self, kind: EntityType) -> &dyn EntityStore {
        self.flaky(kind)
    }
}

#[test]
fn failed_secondary_write_is_reported_as_partial_and_repairable() {
    let conn = open_db_in_memory().unwrap();
    let seeded = SqliteStores::try_new(&conn).unwrap();
    let note = seed(&seeded, EntityType::Note, "note");
    let task = seed(&seeded, EntityType::Task, "task");

    let stores = FlakyStores::new(&conn);
    stores.flaky(EntityType::Task).fail_writes.set(true);
    let service = LinkService::new(&stores);

    let err = service.connect(&request(&note, &task)).unwrap_err();
    let pending = match &err {
        LinkError::PartialLinkFailure {
            completed, pending, ..
        } => {
            assert_eq!(completed.owner_id, note.id);
            assert_eq!(pending.owner_id, task.id);
            pending.clone()
        }
        other => panic!("expected partial failure, got {other}"),
    };
    assert!(!err.is_validation());
    assert_eq!(reload(&seeded, &note).edges.len(), 1);
    assert!(reload(&seeded, &task).edges.is_empty());

    stores.flaky(EntityType::Task).fail_writes.set(false);
    let repaired = service.repair(&pending).unwrap();
    assert!(secondbrain_core::already_linked(&repaired, note.id, EntityType::Note));
}

#[test]
fn failed_second_note_write_is_reported_as_partial() {
    let conn = open_db_in_memory().unwrap();
    let seeded = SqliteStores::try_new(&conn).unwrap();
    let first = seed(&seeded, EntityType::Note, "first");
    let second = seed(&seeded, EntityType::Note, "second");

    let stores = FlakyStores::new(&conn);
    stores.flaky(EntityType::Note).writes_left.set(Some(1));
    let service = LinkService::new(&stores);

    let err = service.connect(&request(&first, &second)).unwrap_err();
    assert_eq!(err.code(), "partial_link_failure");
    let pending = err.pending_write().cloned().expect("pending reciprocal");
    assert_eq!(pending.owner_id, second.id);
    assert!(matches!(
        &pending.mutation,
        LinkMutation::Add(edge) if edge.target == EdgeTarget::PlainId { id: first.id }
    ));
    assert_eq!(reload(&seeded, &first).edges.len(), 1);
    assert!(reload(&seeded, &second).edges.is_empty());

    stores.flaky(EntityType::Note).writes_left.set(None);
    service.repair(&pending).unwrap();
    assert_eq!(reload(&seeded, &second).edges.len(), 1);
    assert_eq!(service.repair_asymmetric().unwrap(), 0);
}

#[test]
fn failed_primary_write_is_a_clean_store_failure() {
    let conn = open_db_in_memory().unwrap();
    let seeded = SqliteStores::try_new(&conn).unwrap();
    let idea = seed(&seeded, EntityType::Idea, "idea");
    let reminder = seed(&seeded, EntityType::Reminder, "reminder");

    let stores = FlakyStores::new(&conn);
    stores.flaky(EntityType::Idea).fail_writes.set(true);
    let service = LinkService::new(&stores);

    let err = service.connect(&request(&idea, &reminder)).unwrap_err();
    assert!(matches!(
        err,
        LinkError::StoreUnavailable(RepoError::Unavailable(_))
    ));
    assert!(reload(&seeded, &reminder).edges.is_empty());
}

#[test]
fn reconnect_completes_a_one_directional_link() {
    let conn = open_db_in_memory().unwrap();
    let seeded = SqliteStores::try_new(&conn).unwrap();
    let idea = seed(&seeded, EntityType::Idea, "idea");
    let task = seed(&seeded, EntityType::Task, "task");

    let stores = FlakyStores::new(&conn);
    stores.flaky(EntityType::Task).fail_writes.set(true);
    let service = LinkService::new(&stores);
    assert!(service.connect(&request(&idea, &task)).is_err());

    stores.flaky(EntityType::Task).fail_writes.set(false);
    let outcome = service.connect(&request(&idea, &task)).unwrap();
    assert!(!outcome.saga.primary_written);
    assert!(outcome.saga.secondary_written);
    assert_eq!(reload(&seeded, &idea).edges.len(), 1);
    assert_eq!(reload(&seeded, &task).edges.len(), 1);
}

#[test]
fn repair_asymmetric_restores_missing_reciprocals() {
    let conn = open_db_in_memory().unwrap();
    let stores = SqliteStores::try_new(&conn).unwrap();
    let note = seed(&stores, EntityType::Note, "note");
    let idea = seed(&stores, EntityType::Idea, "idea");
    let other_note = seed(&stores, EntityType::Note, "other");

    stores
        .store(EntityType::Idea)
        .persist_link_add(
            idea.id,
            &Edge::typed(note.id, EntityType::Note, None, LinkType::Reference, Some(1)),
        )
        .unwrap();
    stores
        .store(EntityType::Note)
        .persist_link_add(
            other_note.id,
            &Edge::plain(note.id, LinkType::Default, Some(1)),
        )
        .unwrap();

    let service = LinkService::new(&stores);
    assert_eq!(service.repair_asymmetric().unwrap(), 2);
    assert_eq!(service.repair_asymmetric().unwrap(), 0);

    let note_after = reload(&stores, &note);
    assert!(secondbrain_core::already_linked(&note_after, idea.id, EntityType::Idea));
    assert!(note_after
        .edges
        .iter()
        .any(|edge| edge.target == EdgeTarget::PlainId { id: other_note.id }));
}
