use crate::Error;
use quilldb_core::{
    RecordKey,
    db::{Db, query::Query, session::Session as CoreSession, session::Tracked},
    traits::EntityKind,
    value::Value,
};

pub use quilldb_core::db::query::Cmp;

///
/// LoadQuery
///
/// Fluent session-aware query. Predicates evaluate against stored rows;
/// matches come back through the session's identity map.
///

pub struct LoadQuery<'a, E: EntityKind> {
    session: &'a CoreSession,
    query: Query<E>,
}

impl<'a, E: EntityKind> LoadQuery<'a, E> {
    pub(crate) fn new(session: &'a CoreSession) -> Self {
        Self {
            session,
            query: Query::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, field: &'static str, cmp: Cmp, value: impl Into<Value>) -> Self {
        self.query = self.query.filter(field, cmp, value);
        self
    }

    #[must_use]
    pub fn join_linked(mut self, relation: &'static str, source: RecordKey) -> Self {
        self.query = self.query.join_linked(relation, source);
        self
    }

    #[must_use]
    pub fn join_linked_inverse(mut self, relation: &'static str, target: RecordKey) -> Self {
        self.query = self.query.join_linked_inverse(relation, target);
        self
    }

    // ---- terminals ----

    pub fn all(self) -> Result<Vec<Tracked<E>>, Error> {
        Ok(self.query.execute(self.session)?.all())
    }

    pub fn first(self) -> Result<Option<Tracked<E>>, Error> {
        Ok(self.query.execute(self.session)?.first())
    }

    pub fn one(self) -> Result<Tracked<E>, Error> {
        Ok(self.query.execute(self.session)?.one()?)
    }

    pub fn at_most_one(self) -> Result<Option<Tracked<E>>, Error> {
        Ok(self.query.execute(self.session)?.at_most_one()?)
    }

    pub fn count(self) -> Result<usize, Error> {
        Ok(self.query.execute(self.session)?.len())
    }
}

///
/// RawQuery
///
/// Store-level query that bypasses every session: matches are decoded
/// straight from the rows, never registered in any identity map.
///

pub struct RawQuery<E: EntityKind> {
    db: Db,
    query: Query<E>,
}

impl<E: EntityKind> RawQuery<E> {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            query: Query::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, field: &'static str, cmp: Cmp, value: impl Into<Value>) -> Self {
        self.query = self.query.filter(field, cmp, value);
        self
    }

    #[must_use]
    pub fn join_linked(mut self, relation: &'static str, source: RecordKey) -> Self {
        self.query = self.query.join_linked(relation, source);
        self
    }

    pub fn all(self) -> Result<Vec<E>, Error> {
        Ok(self.query.execute_raw(&self.db)?)
    }

    pub fn first(self) -> Result<Option<E>, Error> {
        let mut items = self.query.execute_raw(&self.db)?;
        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(items.swap_remove(0)))
        }
    }
}
