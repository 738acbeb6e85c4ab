use library::Author;
use quilldb::prelude::*;

fn open() -> (Db, Session) {
    let db = Db::open();
    (db, Session::open(db))
}

#[test]
fn save_assigns_an_identity_immediately() {
    let (_, session) = open();

    let author = Author::new("tolkien");
    assert!(author.with(|a| a.key).is_none());

    let key = session.save(&author).unwrap();
    assert_eq!(author.with(|a| a.key), Some(key));
}

#[test]
fn a_saved_row_appears_only_after_commit() {
    let (db, session) = open();

    let author = Author::new("tolkien");
    session.save(&author).unwrap();

    assert!(RawQuery::<Author>::new(db).all().unwrap().is_empty());
    assert!(session.query::<Author>().all().unwrap().is_empty());

    session.commit().unwrap();

    assert_eq!(RawQuery::<Author>::new(db).all().unwrap().len(), 1);
    assert_eq!(session.query::<Author>().all().unwrap().len(), 1);
}

#[test]
fn an_evicted_instance_still_flushes_its_queued_insert() {
    let (db, session) = open();

    let author = Author::new("tolkien");
    let key = session.save(&author).unwrap();
    session.evict(&author).unwrap();
    session.commit().unwrap();

    let rows = RawQuery::<Author>::new(db).all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, Some(key));
}

#[test]
fn resaving_after_clear_mints_a_new_identity_for_the_same_instance() {
    let (db, session) = open();

    let author = Author::new("tolkien");
    let old_key = session.save(&author).unwrap();
    session.clear().unwrap();

    let new_key = session.save(&author).unwrap();
    assert_ne!(old_key, new_key);
    assert_eq!(author.with(|a| a.key), Some(new_key));

    session.commit().unwrap();

    // The cleared insert never flushed; only the re-save did.
    let rows = RawQuery::<Author>::new(db).all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, Some(new_key));
}

#[test]
fn persist_accepts_a_transient_instance() {
    let (_, session) = open();

    let author = Author::new("tolkien");
    session.persist(&author).unwrap();
    assert!(author.with(|a| a.key).is_some());

    // Persisting the now-managed instance again is a no-op.
    session.persist(&author).unwrap();
}

#[test]
fn persist_rejects_an_instance_detached_by_clear() {
    let (_, session) = open();

    let author = Author::new("tolkien");
    session.save(&author).unwrap();
    session.clear().unwrap();

    let err = session.persist(&author).unwrap_err();
    assert!(err.is_detached_entity());
}

#[test]
fn persist_rejects_an_instance_from_another_session() {
    let (db, first) = open();

    let author = Author::new("tolkien");
    first.save(&author).unwrap();
    first.commit().unwrap();
    first.close();

    let second = Session::open(db);
    let err = second.persist(&author).unwrap_err();
    assert!(err.is_detached_entity());
}

#[test]
fn save_reattaches_a_detached_instance_under_a_new_identity() {
    let (db, first) = open();

    let author = Author::new("tolkien");
    let old_key = first.save(&author).unwrap();
    first.commit().unwrap();
    first.close();

    let second = Session::open(db);
    let new_key = second.save(&author).unwrap();
    assert_ne!(old_key, new_key);

    second.commit().unwrap();

    // Both rows exist now: the committed original and the re-save.
    assert_eq!(RawQuery::<Author>::new(db).all().unwrap().len(), 2);
}

#[test]
fn operations_on_a_closed_session_fail() {
    let (_, session) = open();
    session.close();

    let author = Author::new("tolkien");
    assert!(session.save(&author).is_err());
    assert!(session.commit().is_err());
}
