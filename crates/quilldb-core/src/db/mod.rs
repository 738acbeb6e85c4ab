pub mod lazy;
pub mod query;
pub mod response;
pub mod session;
pub mod store;

use crate::{
    db::store::{DataRegistry, LinkStore, RawRow, SequenceRegistry},
    key::{Key, RecordKey},
};
use std::{cell::RefCell, thread::LocalKey};

thread_local! {
    static DATA: RefCell<DataRegistry> = RefCell::new(DataRegistry::new());
    static LINKS: RefCell<LinkStore> = RefCell::new(LinkStore::new());
    static SEQUENCES: RefCell<SequenceRegistry> = RefCell::new(SequenceRegistry::new());
}

///
/// Db
///
/// Handle to the backing store: data rows, link rows, and key sequences.
/// Stores are thread-local, so every `Db` handle on one thread shares the
/// same underlying state; sessions opened over it each keep their own
/// independent identity map.
///

pub struct Db {
    data: &'static LocalKey<RefCell<DataRegistry>>,
    links: &'static LocalKey<RefCell<LinkStore>>,
    sequences: &'static LocalKey<RefCell<SequenceRegistry>>,
}

impl Db {
    #[must_use]
    pub fn open() -> Self {
        Self {
            data: &DATA,
            links: &LINKS,
            sequences: &SEQUENCES,
        }
    }

    // ------------------------------------------------------------------
    // Registry access
    // ------------------------------------------------------------------

    /// Run a closure with read access to the data registry.
    pub fn with_data<R>(&self, f: impl FnOnce(&DataRegistry) -> R) -> R {
        self.data.with(|cell| f(&cell.borrow()))
    }

    /// Run a closure with write access to the data registry.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut DataRegistry) -> R) -> R {
        self.data.with(|cell| f(&mut cell.borrow_mut()))
    }

    /// Run a closure with read access to the link store.
    pub fn with_links<R>(&self, f: impl FnOnce(&LinkStore) -> R) -> R {
        self.links.with(|cell| f(&cell.borrow()))
    }

    /// Run a closure with write access to the link store.
    pub fn with_links_mut<R>(&self, f: impl FnOnce(&mut LinkStore) -> R) -> R {
        self.links.with(|cell| f(&mut cell.borrow_mut()))
    }

    // ------------------------------------------------------------------
    // Row access
    // ------------------------------------------------------------------

    /// Allocate the next surrogate key for an entity type.
    pub fn next_key(&self, entity: &'static str) -> Key {
        self.sequences.with(|cell| cell.borrow_mut().next(entity))
    }

    #[must_use]
    pub fn row(&self, record: RecordKey) -> Option<RawRow> {
        self.with_data(|reg| {
            reg.store(record.entity)
                .and_then(|store| store.get(&record.key).cloned())
        })
    }

    /// Insert or replace a row, returning the prior row if any.
    pub fn insert_row(&self, record: RecordKey, row: RawRow) -> Option<RawRow> {
        self.with_data_mut(|reg| reg.store_mut(record.entity).insert(record.key, row))
    }

    pub fn remove_row(&self, record: RecordKey) -> Option<RawRow> {
        self.with_data_mut(|reg| reg.store_mut(record.entity).remove(&record.key))
    }

    /// Snapshot of every (key, row) pair for one entity type, key order.
    #[must_use]
    pub fn scan(&self, entity: &'static str) -> Vec<(Key, RawRow)> {
        self.with_data(|reg| {
            reg.store(entity).map_or_else(Vec::new, |store| {
                store.iter().map(|(k, row)| (*k, row.clone())).collect()
            })
        })
    }

    // ------------------------------------------------------------------
    // Harness maintenance
    // ------------------------------------------------------------------

    /// Remove every row of one entity type. Sequences are untouched, so
    /// keys are never reissued. Returns the number of rows removed.
    pub fn clear_entity(&self, entity: &'static str) -> usize {
        self.with_data_mut(|reg| {
            let store = reg.store_mut(entity);
            let count = store.len();
            store.clear();
            count
        })
    }

    /// Drop every link row of one relation. Returns the number removed.
    pub fn clear_links(&self, relation: &'static str) -> usize {
        self.with_links_mut(|links| links.clear_relation(relation))
    }
}

// Manual Copy + Clone implementations.
// Safe because Db only contains &'static LocalKey handles; duplicating
// them does not duplicate the stores.
impl Copy for Db {}

impl Clone for Db {
    fn clone(&self) -> Self {
        *self
    }
}
