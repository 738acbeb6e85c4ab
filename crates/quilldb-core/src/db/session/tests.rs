use crate::{
    db::{
        Db,
        query::{Cmp, Query},
        session::{Session, Tracked, fail_after},
    },
    error::ErrorClass,
    test_fixtures::{Person, Pet},
    value::Value,
};
use std::rc::Rc;

fn session() -> (Db, Rc<Session>) {
    let db = Db::open();
    let session = Session::open(db);
    (db, session)
}

// ---- save / persist ----

#[test]
fn save_mints_a_key_and_tracks_the_instance() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let key = session.save(&alice).unwrap();

    assert_eq!(alice.with(|p| p.key), Some(key));
    let resolved = session.get::<Person>(key).unwrap().unwrap();
    assert!(resolved.ptr_eq(&alice));
}

#[test]
fn saving_a_managed_instance_again_is_a_no_op() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let first = session.save(&alice).unwrap();
    let second = session.save(&alice).unwrap();

    assert_eq!(first, second);
}

#[test]
fn saving_an_untracked_keyed_instance_mints_a_new_key() {
    let (db, session) = session();

    let alice = Person::new("alice", 30);
    let old_key = session.save(&alice).unwrap();
    session.clear().unwrap();

    let new_key = session.save(&alice).unwrap();
    assert_ne!(old_key, new_key);
    assert_eq!(alice.with(|p| p.key), Some(new_key));

    session.commit().unwrap();
    assert!(db.row(crate::key::RecordKey::new("person", old_key)).is_none());
    assert!(db.row(crate::key::RecordKey::new("person", new_key)).is_some());
}

#[test]
fn persist_rejects_a_detached_instance() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    session.save(&alice).unwrap();
    session.clear().unwrap();

    let err = session.persist(&alice).unwrap_err();
    assert_eq!(err.class, ErrorClass::Detached);
}

#[test]
fn pending_inserts_are_invisible_to_queries_until_commit() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    session.save(&alice).unwrap();

    let before = Query::<Person>::new().execute(&session).unwrap();
    assert!(before.is_empty());

    session.commit().unwrap();

    let after = Query::<Person>::new().execute(&session).unwrap();
    assert_eq!(after.len(), 1);
}

// ---- update / merge ----

#[test]
fn update_collides_with_a_different_tracked_instance() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    session.save(&alice).unwrap();
    session.commit().unwrap();

    let detached = Tracked::new(alice.with(Clone::clone));
    assert!(!detached.ptr_eq(&alice));

    let err = session.update(&detached).unwrap_err();
    assert_eq!(err.class, ErrorClass::Conflict);
}

#[test]
fn update_reattaches_when_nothing_is_tracked() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let key = session.save(&alice).unwrap();
    session.commit().unwrap();
    session.clear().unwrap();

    alice.with_mut(|p| p.age = 31);
    session.update(&alice).unwrap();
    session.commit().unwrap();

    session.clear().unwrap();
    let reloaded = session.load::<Person>(key).unwrap();
    assert_eq!(reloaded.with(|p| p.age), 31);
}

#[test]
fn merge_copies_state_onto_the_tracked_instance() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    session.save(&alice).unwrap();
    session.commit().unwrap();

    let detached = Tracked::new(alice.with(Clone::clone));
    detached.with_mut(|p| p.age = 40);

    let managed = session.merge(&detached).unwrap();
    assert!(managed.ptr_eq(&alice));
    assert!(!managed.ptr_eq(&detached));
    assert_eq!(alice.with(|p| p.age), 40);
}

#[test]
fn merge_of_a_transient_instance_saves_a_copy() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let managed = session.merge(&alice).unwrap();

    assert!(!managed.ptr_eq(&alice));
    assert!(managed.with(|p| p.key).is_some());
    // The original stays transient.
    assert!(alice.with(|p| p.key).is_none());
}

// ---- evict / clear ----

#[test]
fn a_queued_insert_survives_eviction() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let key = session.save(&alice).unwrap();
    session.evict(&alice).unwrap();

    // No longer tracked...
    let resolved = session.get::<Person>(key).unwrap();
    assert!(resolved.is_none());

    // ...but the insert still flushes.
    session.commit().unwrap();
    let reloaded = session.load::<Person>(key).unwrap();
    assert_eq!(reloaded.with(|p| p.name.clone()), "alice");
}

#[test]
fn clear_drops_queued_inserts() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let key = session.save(&alice).unwrap();
    session.clear().unwrap();
    session.commit().unwrap();

    assert!(session.get::<Person>(key).unwrap().is_none());
}

// ---- dirty checking ----

#[test]
fn in_memory_changes_flush_on_commit_without_an_explicit_update() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let key = session.save(&alice).unwrap();
    session.commit().unwrap();

    alice.with_mut(|p| p.age = 31);
    session.commit().unwrap();

    session.clear().unwrap();
    assert_eq!(session.load::<Person>(key).unwrap().with(|p| p.age), 31);
}

// ---- queries ----

#[test]
fn session_queries_match_stored_values_but_return_current_state() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    session.save(&alice).unwrap();
    session.commit().unwrap();

    // Stored row still says 30; memory says 31.
    alice.with_mut(|p| p.age = 31);

    let hits = Query::<Person>::new()
        .filter("age", Cmp::Eq, Value::Uint(30))
        .execute(&session)
        .unwrap();
    let hit = hits.one().unwrap();
    assert!(hit.ptr_eq(&alice));
    assert_eq!(hit.with(|p| p.age), 31);
}

#[test]
fn raw_queries_bypass_the_identity_map() {
    let (db, session) = session();

    let alice = Person::new("alice", 30);
    session.save(&alice).unwrap();
    session.commit().unwrap();
    alice.with_mut(|p| p.age = 31);

    let raw = Query::<Person>::new().execute_raw(&db).unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].age, 30);
}

#[test]
fn cross_family_filters_never_match() {
    let (_, session) = session();

    session.save(&Person::new("alice", 30)).unwrap();
    session.commit().unwrap();

    let hits = Query::<Person>::new()
        .filter("age", Cmp::Ne, Value::Text("thirty".to_string()))
        .execute(&session)
        .unwrap();
    assert!(hits.is_empty());
}

// ---- delete ----

#[test]
fn get_of_a_delete_pending_instance_returns_none() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let key = session.save(&alice).unwrap();
    session.commit().unwrap();

    session.delete(&alice).unwrap();
    assert!(session.get::<Person>(key).unwrap().is_none());
}

#[test]
fn delete_cascades_along_ownership_edges() {
    let (db, session) = session();

    let alice = Person::new("alice", 30);
    let owner = session.save(&alice).unwrap();
    let rex = Pet::new(owner, "rex");
    let pet_key = session.save(&rex).unwrap();
    session.commit().unwrap();

    session.delete(&alice).unwrap();
    session.commit().unwrap();

    assert!(db.row(crate::key::RecordKey::new("person", owner)).is_none());
    assert!(db.row(crate::key::RecordKey::new("pet", pet_key)).is_none());
}

#[test]
fn save_cascades_to_loaded_children() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let owner = session.save(&alice).unwrap();
    alice.with(|p| p.pets.set(vec![Pet::new(owner, "rex")]));
    session.commit().unwrap();

    session.clear().unwrap();
    let pets = session.fetch_owned::<Pet>("owner", owner).unwrap();
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].with(|p| p.name.clone()), "rex");
}

// ---- lazy associations ----

#[test]
fn lazy_collections_load_through_the_owning_session() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let owner = session.save(&alice).unwrap();
    session.save(&Pet::new(owner, "rex")).unwrap();
    session.commit().unwrap();
    session.clear().unwrap();

    let reloaded = session.load::<Person>(owner).unwrap();
    let pets = reloaded.with(|p| p.pets.get()).unwrap();
    assert_eq!(pets.len(), 1);
}

#[test]
fn lazy_access_after_close_fails() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let owner = session.save(&alice).unwrap();
    session.commit().unwrap();
    session.clear().unwrap();

    let reloaded = session.load::<Person>(owner).unwrap();
    session.close();

    let err = reloaded.with(|p| p.pets.get()).unwrap_err();
    assert_eq!(err.class, ErrorClass::Unloaded);
}

#[test]
fn lazy_access_after_clear_fails() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let owner = session.save(&alice).unwrap();
    session.commit().unwrap();
    session.clear().unwrap();

    let reloaded = session.load::<Person>(owner).unwrap();
    session.clear().unwrap();

    let err = reloaded.with(|p| p.pets.get()).unwrap_err();
    assert_eq!(err.class, ErrorClass::Unloaded);
}

// ---- refresh ----

#[test]
fn refresh_discards_in_memory_changes_and_loads_associations() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    let owner = session.save(&alice).unwrap();
    session.save(&Pet::new(owner, "rex")).unwrap();
    session.commit().unwrap();

    alice.with_mut(|p| p.age = 99);
    session.refresh(&alice).unwrap();

    assert_eq!(alice.with(|p| p.age), 30);
    assert!(alice.with(|p| p.pets.is_loaded()));
}

#[test]
fn refresh_collides_with_a_different_tracked_instance() {
    let (_, session) = session();

    let alice = Person::new("alice", 30);
    session.save(&alice).unwrap();
    session.commit().unwrap();

    let detached = Tracked::new(alice.with(Clone::clone));
    let err = session.refresh(&detached).unwrap_err();
    assert_eq!(err.class, ErrorClass::Conflict);
}

// ---- commit atomicity ----

#[test]
fn a_failed_commit_rolls_back_every_applied_mutation() {
    let (db, session) = session();

    let alice = Person::new("alice", 30);
    let a = session.save(&alice).unwrap();
    session.commit().unwrap();

    let bob = Person::new("bob", 25);
    let b = session.save(&bob).unwrap();
    alice.with_mut(|p| p.age = 31);

    // Fail after the first applied mutation so one write must be undone.
    fail_after(1);
    let err = session.commit().unwrap_err();
    assert_eq!(err.class, ErrorClass::Internal);

    // Stored state is exactly the pre-commit state.
    assert!(db.row(crate::key::RecordKey::new("person", b)).is_none());
    let row = db.row(crate::key::RecordKey::new("person", a)).unwrap();
    assert_eq!(row.decode::<Person>().unwrap().age, 30);

    // Intents stay queued; a clean retry flushes them.
    session.commit().unwrap();
    assert!(db.row(crate::key::RecordKey::new("person", b)).is_some());
}

// ---- lifecycle ----

#[test]
fn operations_on_a_closed_session_fail() {
    let (_, session) = session();
    session.close();

    let err = session.save(&Person::new("alice", 30)).unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);
}

#[test]
fn sessions_over_one_db_share_stored_rows_but_not_instances() {
    let (db, first) = session();
    let second = Session::open(db);

    let alice = Person::new("alice", 30);
    let key = first.save(&alice).unwrap();
    first.commit().unwrap();

    let theirs = second.load::<Person>(key).unwrap();
    assert!(!theirs.ptr_eq(&alice));

    // Divergent commits: the later one wins.
    alice.with_mut(|p| p.age = 31);
    theirs.with_mut(|p| p.age = 32);
    first.commit().unwrap();
    second.commit().unwrap();

    let row = db.row(crate::key::RecordKey::new("person", key)).unwrap();
    assert_eq!(row.decode::<Person>().unwrap().age, 32);
}

#[test]
fn a_clean_instance_never_overwrites_another_sessions_commit() {
    let (db, first) = session();
    let second = Session::open(db);

    let alice = Person::new("alice", 30);
    let key = first.save(&alice).unwrap();
    first.commit().unwrap();

    let theirs = second.load::<Person>(key).unwrap();
    theirs.with_mut(|p| p.age = 40);
    second.commit().unwrap();

    // The first session holds alice clean and unmodified; its flush must
    // not roll the row back to the state it loaded.
    first.commit().unwrap();

    let row = db.row(crate::key::RecordKey::new("person", key)).unwrap();
    assert_eq!(row.decode::<Person>().unwrap().age, 40);
}
