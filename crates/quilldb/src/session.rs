use crate::{Error, query::LoadQuery};
use quilldb_core::{
    Key,
    db::{Db, session::Session as CoreSession, session::Tracked},
    traits::EntityKind,
};
use std::rc::Rc;

///
/// Session
///
/// Caller-facing handle over the core session: same identity-map and
/// unit-of-work semantics, with errors converted to the public taxonomy
/// and a fluent query entry point.
///

#[derive(Clone)]
pub struct Session {
    inner: Rc<CoreSession>,
}

impl Session {
    #[must_use]
    pub fn open(db: Db) -> Self {
        Self {
            inner: CoreSession::open(db),
        }
    }

    /// Enable operation traces on stdout.
    #[must_use]
    pub fn debug(self) -> Self {
        self.inner.set_debug(true);
        self
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// The core session, for association fetch helpers and advanced use.
    #[must_use]
    pub fn core(&self) -> &Rc<CoreSession> {
        &self.inner
    }

    // ---- reads ----

    pub fn get<E: EntityKind>(&self, key: Key) -> Result<Option<Tracked<E>>, Error> {
        Ok(self.inner.get::<E>(key)?)
    }

    pub fn load<E: EntityKind>(&self, key: Key) -> Result<Tracked<E>, Error> {
        Ok(self.inner.load::<E>(key)?)
    }

    /// Session-aware query over one entity type.
    #[must_use]
    pub fn query<E: EntityKind>(&self) -> LoadQuery<'_, E> {
        LoadQuery::new(&self.inner)
    }

    // ---- writes ----

    pub fn save<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<Key, Error> {
        Ok(self.inner.save(entity)?)
    }

    pub fn persist<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), Error> {
        Ok(self.inner.persist(entity)?)
    }

    pub fn update<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), Error> {
        Ok(self.inner.update(entity)?)
    }

    pub fn merge<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<Tracked<E>, Error> {
        Ok(self.inner.merge(entity)?)
    }

    pub fn delete<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), Error> {
        Ok(self.inner.delete(entity)?)
    }

    // ---- lifecycle ----

    pub fn evict<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), Error> {
        Ok(self.inner.evict(entity)?)
    }

    pub fn clear(&self) -> Result<(), Error> {
        Ok(self.inner.clear()?)
    }

    pub fn refresh<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), Error> {
        Ok(self.inner.refresh(entity)?)
    }

    pub fn commit(&self) -> Result<(), Error> {
        Ok(self.inner.commit()?)
    }

    pub fn close(&self) {
        self.inner.close();
    }
}
