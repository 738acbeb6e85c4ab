use crate::{
    db::{Db, response::Response, session::Session},
    error::InternalError,
    key::{Key, RecordKey},
    traits::{EntityKind, FieldValues},
    value::Value,
};
use std::cmp::Ordering;

///
/// Cmp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    /// Whether `ordering` (of field value against probe value) satisfies
    /// this comparator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Ne => !matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Le => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Ge => !matches!(ordering, Ordering::Less),
        }
    }
}

///
/// FilterClause
///
/// One field predicate. Missing fields and cross-family comparisons never
/// match, whatever the comparator.
///

#[derive(Clone, Debug)]
pub struct FilterClause {
    pub field: &'static str,
    pub cmp: Cmp,
    pub value: Value,
}

impl FilterClause {
    #[must_use]
    pub const fn new(field: &'static str, cmp: Cmp, value: Value) -> Self {
        Self { field, cmp, value }
    }

    #[must_use]
    pub fn matches<E: FieldValues>(&self, entity: &E) -> bool {
        entity
            .field(self.field)
            .and_then(|actual| actual.compare(&self.value))
            .is_some_and(|ordering| self.cmp.accepts(ordering))
    }
}

///
/// JoinClause
///
/// Restricts candidates to one side of a link relation.
///

#[derive(Clone, Copy, Debug)]
enum JoinClause {
    /// Candidates are targets linked from `source`.
    Forward {
        relation: &'static str,
        source: RecordKey,
    },

    /// Candidates are sources linking to `target`.
    Inverse {
        relation: &'static str,
        target: RecordKey,
    },
}

///
/// Query
///
/// Declarative row query over one entity type. Predicates always evaluate
/// against stored rows; what happens to the matches depends on how the
/// query is executed:
///
/// - [`execute`](Self::execute) resolves matches through the session's
///   identity map, so a returned instance shows its current in-memory
///   state even when the match was decided on older stored values.
/// - [`execute_raw`](Self::execute_raw) decodes matches straight from the
///   stores, bypassing every session.
///

#[derive(Clone, Debug, Default)]
pub struct Query<E: EntityKind> {
    filters: Vec<FilterClause>,
    joins: Vec<JoinClause>,
    marker: std::marker::PhantomData<E>,
}

impl<E: EntityKind> Query<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            joins: Vec::new(),
            marker: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn filter(mut self, field: &'static str, cmp: Cmp, value: impl Into<Value>) -> Self {
        self.filters.push(FilterClause::new(field, cmp, value.into()));
        self
    }

    /// Keep only rows that are link targets of `source` under `relation`.
    #[must_use]
    pub fn join_linked(mut self, relation: &'static str, source: RecordKey) -> Self {
        self.joins.push(JoinClause::Forward { relation, source });
        self
    }

    /// Keep only rows that link to `target` under `relation`.
    #[must_use]
    pub fn join_linked_inverse(mut self, relation: &'static str, target: RecordKey) -> Self {
        self.joins.push(JoinClause::Inverse { relation, target });
        self
    }

    /// Candidate keys in stored order, with join clauses applied. Link ends
    /// are entity-typed, so a candidate only survives a join when its own
    /// record sits on the matching side of the relation.
    fn candidates(&self, db: &Db) -> Vec<Key> {
        let mut keys: Vec<Key> = db.scan(E::ENTITY_NAME).into_iter().map(|(k, _)| k).collect();
        for join in &self.joins {
            let allowed: Vec<RecordKey> = match *join {
                JoinClause::Forward { relation, source } => {
                    db.with_links(|store| store.targets(relation, source))
                }
                JoinClause::Inverse { relation, target } => {
                    db.with_links(|store| store.sources(relation, target))
                }
            };
            keys.retain(|key| allowed.contains(&RecordKey::new(E::ENTITY_NAME, *key)));
        }
        keys
    }

    fn matches_stored(&self, stored: &E) -> bool {
        self.filters.iter().all(|clause| clause.matches(stored))
    }

    /// Run session-aware: predicates against stored rows, matches resolved
    /// through the identity map. Rows pending insertion are invisible
    /// until committed; instances pending removal are dropped from the
    /// result.
    pub fn execute(&self, session: &Session) -> Result<Response<E>, InternalError> {
        let db = session.db();
        let mut items = Vec::new();

        for key in self.candidates(&db) {
            let record = RecordKey::new(E::ENTITY_NAME, key);
            let Some(row) = db.row(record) else { continue };
            let stored = row.decode::<E>()?;
            if !self.matches_stored(&stored) {
                continue;
            }
            if let Some(tracked) = session.resolve::<E>(key)? {
                items.push(tracked);
            }
        }

        Ok(Response::new(items))
    }

    /// Run raw: matches decoded straight from the stores. The identity map
    /// never sees these instances, so they can disagree with tracked ones.
    pub fn execute_raw(&self, db: &Db) -> Result<Vec<E>, InternalError> {
        let mut items = Vec::new();

        for key in self.candidates(db) {
            let record = RecordKey::new(E::ENTITY_NAME, key);
            let Some(row) = db.row(record) else { continue };
            let stored = row.decode::<E>()?;
            if self.matches_stored(&stored) {
                items.push(stored);
            }
        }

        Ok(items)
    }
}
