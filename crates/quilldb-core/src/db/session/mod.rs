mod commit;
mod slot;
#[cfg(test)]
mod tests;
mod tracked;

pub use commit::CascadeCtx;
pub use slot::{Pending, TrackedSlot};
pub use tracked::Tracked;

#[cfg(test)]
pub(crate) use commit::fail_after;

use crate::{
    db::Db,
    error::InternalError,
    key::{Key, RecordKey},
    traits::{EntityKind, FieldValues},
};
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::{Rc, Weak},
};

///
/// Session
///
/// Identity map plus unit of work over one `Db` handle. At most one
/// in-memory instance exists per (entity, key); reads resolve through the
/// map, writes are buffered as intents and flushed atomically on commit.
///
/// Sessions are single-threaded and cheap; open one per logical task. The
/// epoch counter advances on `clear` so lazy associations bound before the
/// clear can refuse to load afterwards.
///

pub struct Session {
    db: Db,
    weak: Weak<Session>,
    open: Cell<bool>,
    epoch: Cell<u64>,
    debug: Cell<bool>,
    slots: RefCell<BTreeMap<RecordKey, TrackedSlot>>,

    // Inserts whose instances were evicted after save. They stay queued
    // and flush on commit even though the instances are no longer tracked.
    detached_inserts: RefCell<BTreeMap<RecordKey, TrackedSlot>>,
}

impl Session {
    #[must_use]
    pub fn open(db: Db) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            db,
            weak: weak.clone(),
            open: Cell::new(true),
            epoch: Cell::new(0),
            debug: Cell::new(false),
            slots: RefCell::new(BTreeMap::new()),
            detached_inserts: RefCell::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub const fn db(&self) -> Db {
        self.db
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Clear generation. Lazy associations capture it when bound and
    /// refuse to load once it has moved on.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    #[must_use]
    pub fn weak_handle(&self) -> Weak<Self> {
        self.weak.clone()
    }

    /// Route operation traces to stdout.
    pub fn set_debug(&self, on: bool) {
        self.debug.set(on);
    }

    pub(crate) fn debug_log(&self, s: impl AsRef<str>) {
        if self.debug.get() {
            println!("[debug] {}", s.as_ref());
        }
    }

    fn ensure_open(&self) -> Result<(), InternalError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(InternalError::session_closed())
        }
    }

    // ------------------------------------------------------------------
    // Identity map plumbing
    // ------------------------------------------------------------------

    pub(crate) fn slot(&self, record: RecordKey) -> Option<TrackedSlot> {
        self.slots.borrow().get(&record).cloned()
    }

    pub(crate) fn insert_slot(&self, record: RecordKey, slot: TrackedSlot) {
        self.slots.borrow_mut().insert(record, slot);
    }

    pub(crate) fn snapshot_slots(&self) -> Vec<(RecordKey, TrackedSlot)> {
        self.slots
            .borrow()
            .iter()
            .map(|(record, slot)| (*record, slot.clone()))
            .collect()
    }

    pub(crate) fn snapshot_detached_inserts(&self) -> Vec<(RecordKey, TrackedSlot)> {
        self.detached_inserts
            .borrow()
            .iter()
            .map(|(record, slot)| (*record, slot.clone()))
            .collect()
    }

    /// Whether this exact instance is the one tracked under its key.
    fn is_managed<E: EntityKind>(&self, entity: &Tracked<E>) -> bool {
        let Some(key) = entity.with(E::key) else {
            return false;
        };
        self.slot(RecordKey::new(E::ENTITY_NAME, key))
            .and_then(|slot| slot.typed::<E>())
            .is_some_and(|tracked| tracked.ptr_eq(entity))
    }

    fn track<E: EntityKind>(
        &self,
        key: Key,
        entity: &Tracked<E>,
        pending: Pending,
    ) -> TrackedSlot {
        let slot = TrackedSlot::new(entity, pending);
        slot.bind(self);
        self.insert_slot(RecordKey::new(E::ENTITY_NAME, key), slot.clone());
        slot
    }

    /// Resolve a stored row through the identity map: the tracked instance
    /// when one exists, otherwise a fresh instance decoded from the row and
    /// tracked from here on. Instances scheduled for removal resolve to
    /// `None`.
    pub(crate) fn resolve<E: EntityKind>(
        &self,
        key: Key,
    ) -> Result<Option<Tracked<E>>, InternalError> {
        let record = RecordKey::new(E::ENTITY_NAME, key);

        if let Some(slot) = self.slot(record) {
            if slot.pending() == Pending::Delete {
                return Ok(None);
            }
            let tracked = slot.typed::<E>().ok_or_else(|| {
                InternalError::session_internal(format!("identity map slot mismatch at {record}"))
            })?;
            return Ok(Some(tracked));
        }

        let Some(row) = self.db.row(record) else {
            return Ok(None);
        };
        let entity = row.decode::<E>()?;
        let tracked = Tracked::new(entity);
        self.track(key, &tracked, Pending::Clean).set_baseline(row);

        Ok(Some(tracked))
    }

    /// Resolve one end of a link row. A delete-pending end is skipped; an
    /// end with no stored row at all is a dangling link.
    fn resolve_link_end<E: EntityKind>(
        &self,
        relation: &'static str,
        key: Key,
    ) -> Result<Option<Tracked<E>>, InternalError> {
        match self.resolve::<E>(key)? {
            Some(tracked) => Ok(Some(tracked)),
            None if self.db.row(RecordKey::new(E::ENTITY_NAME, key)).is_some() => Ok(None),
            None => Err(InternalError::store_dangling_link(relation, key)),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The instance for `key`, or `None` when no row exists.
    pub fn get<E: EntityKind>(&self, key: Key) -> Result<Option<Tracked<E>>, InternalError> {
        self.ensure_open()?;
        self.resolve::<E>(key)
    }

    /// Like [`get`](Self::get), but a missing row is an error.
    pub fn load<E: EntityKind>(&self, key: Key) -> Result<Tracked<E>, InternalError> {
        self.get::<E>(key)?
            .ok_or_else(|| InternalError::store_not_found(E::ENTITY_NAME, key))
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Queue an insert for `entity`, minting a fresh identity unless this
    /// exact instance is already tracked.
    ///
    /// An untracked instance always gets a new key, even when it carries
    /// one from an earlier session or a cleared identity map; the instance
    /// is reused under the new identity.
    pub fn save<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<Key, InternalError> {
        self.ensure_open()?;

        if self.is_managed(entity) {
            // Already part of the unit of work; saving again is a no-op.
            let key = entity.with(E::key).ok_or_else(|| {
                InternalError::session_internal("managed instance lost its key")
            })?;
            return Ok(key);
        }

        let key = self.db.next_key(E::ENTITY_NAME);
        entity.with_mut(|e| e.set_key(key));
        self.track(key, entity, Pending::Insert);
        self.debug_log(format!("save {} -> insert queued", RecordKey::new(E::ENTITY_NAME, key)));

        Ok(key)
    }

    /// Queue an insert for a transient `entity`.
    ///
    /// Unlike [`save`](Self::save), an untracked instance that already
    /// carries an identity is rejected as detached.
    pub fn persist<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.ensure_open()?;

        if self.is_managed(entity) {
            return Ok(());
        }
        if let Some(key) = entity.with(E::key) {
            return Err(InternalError::session_detached(E::ENTITY_NAME, key));
        }

        let key = self.db.next_key(E::ENTITY_NAME);
        entity.with_mut(|e| e.set_key(key));
        self.track(key, entity, Pending::Insert);

        Ok(())
    }

    /// Reattach a detached instance and queue an update from its state.
    ///
    /// Fails with the non-unique-object error when another instance is
    /// already tracked under the same key.
    pub fn update<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.ensure_open()?;

        let Some(key) = entity.with(E::key) else {
            return Err(InternalError::session_transient(E::ENTITY_NAME));
        };
        let record = RecordKey::new(E::ENTITY_NAME, key);

        if let Some(slot) = self.slot(record) {
            let same = slot
                .typed::<E>()
                .is_some_and(|tracked| tracked.ptr_eq(entity));
            if !same {
                return Err(InternalError::session_non_unique(E::ENTITY_NAME, key));
            }
            slot.set_pending(Pending::Update);
            return Ok(());
        }

        self.track(key, entity, Pending::Update);

        Ok(())
    }

    /// Copy a detached instance's state onto the tracked instance for its
    /// key and return the tracked copy. Never collides: when another
    /// instance is already tracked, its state is overwritten in place.
    pub fn merge<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<Tracked<E>, InternalError> {
        self.ensure_open()?;

        let state = entity.with(Clone::clone);

        let Some(key) = state.key() else {
            // No identity yet: merge degenerates to saving a copy.
            let copy = Tracked::new(state);
            let key = self.db.next_key(E::ENTITY_NAME);
            copy.with_mut(|e| e.set_key(key));
            self.track(key, &copy, Pending::Insert);
            return Ok(copy);
        };
        let record = RecordKey::new(E::ENTITY_NAME, key);

        if let Some(slot) = self.slot(record) {
            let tracked = slot.typed::<E>().ok_or_else(|| {
                InternalError::session_internal(format!("identity map slot mismatch at {record}"))
            })?;
            tracked.with_mut(|managed| *managed = state);
            slot.bind(self);
            if slot.pending() == Pending::Clean {
                slot.set_pending(Pending::Update);
            }
            return Ok(tracked);
        }

        // Untracked: adopt the carried key. The pending intent depends on
        // whether a row already exists for it.
        let pending = if self.db.row(record).is_some() {
            Pending::Update
        } else {
            Pending::Insert
        };
        let copy = Tracked::new(state);
        self.track(key, &copy, pending);

        Ok(copy)
    }

    /// Queue removal of `entity` and, at commit, of everything reachable
    /// along its ownership edges.
    pub fn delete<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.ensure_open()?;

        let Some(key) = entity.with(E::key) else {
            return Err(InternalError::session_transient(E::ENTITY_NAME));
        };
        let record = RecordKey::new(E::ENTITY_NAME, key);

        if let Some(slot) = self.slot(record) {
            slot.set_pending(Pending::Delete);
        } else {
            self.track(key, entity, Pending::Delete);
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Detach one instance from the identity map. A queued insert survives
    /// eviction and still flushes on commit.
    pub fn evict<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.ensure_open()?;

        let Some(key) = entity.with(E::key) else {
            return Ok(());
        };
        let record = RecordKey::new(E::ENTITY_NAME, key);

        let Some(slot) = self.slots.borrow_mut().remove(&record) else {
            return Ok(());
        };
        if slot.pending() == Pending::Insert {
            self.detached_inserts.borrow_mut().insert(record, slot);
        }

        Ok(())
    }

    /// Detach everything and drop all buffered intents, queued inserts
    /// included. Advances the epoch so lazy associations bound before the
    /// clear refuse to load.
    pub fn clear(&self) -> Result<(), InternalError> {
        self.ensure_open()?;

        self.slots.borrow_mut().clear();
        self.detached_inserts.borrow_mut().clear();
        self.epoch.set(self.epoch.get() + 1);
        self.debug_log(format!("clear -> epoch {}", self.epoch.get()));

        Ok(())
    }

    /// Reload `entity` from its stored row, discarding in-memory changes,
    /// then force its associations loaded.
    ///
    /// Fails with the non-unique-object error when a different instance is
    /// already tracked under the same key.
    pub fn refresh<E: EntityKind>(&self, entity: &Tracked<E>) -> Result<(), InternalError> {
        self.ensure_open()?;

        let Some(key) = entity.with(E::key) else {
            return Err(InternalError::session_transient(E::ENTITY_NAME));
        };
        let record = RecordKey::new(E::ENTITY_NAME, key);

        if let Some(slot) = self.slot(record) {
            let same = slot
                .typed::<E>()
                .is_some_and(|tracked| tracked.ptr_eq(entity));
            if !same {
                return Err(InternalError::session_non_unique(E::ENTITY_NAME, key));
            }
        }

        let row = self
            .db
            .row(record)
            .ok_or_else(|| InternalError::store_not_found(E::ENTITY_NAME, key))?;
        let fresh = row.decode::<E>()?;
        entity.with_mut(|e| *e = fresh);

        // The reloaded state becomes the tracked state for this key.
        let slot = TrackedSlot::new(entity, Pending::Clean);
        slot.bind(self);
        slot.set_baseline(row);
        self.insert_slot(record, slot.clone());
        slot.force_load()?;

        Ok(())
    }

    /// Flush the unit of work atomically. On failure every store mutation
    /// already applied is rolled back and the buffered intents stay queued.
    pub fn commit(&self) -> Result<(), InternalError> {
        self.ensure_open()?;
        commit::run(self)
    }

    /// Close the session. Buffered intents are discarded and lazy
    /// associations bound to this session stop loading.
    pub fn close(&self) {
        self.open.set(false);
        self.slots.borrow_mut().clear();
        self.detached_inserts.borrow_mut().clear();
    }

    pub(crate) fn settle_after_commit(&self) -> Result<(), InternalError> {
        let mut slots = self.slots.borrow_mut();
        slots.retain(|_, slot| slot.pending() != Pending::Delete);
        for slot in slots.values() {
            slot.set_pending(Pending::Clean);
            // The just-flushed state is the new dirty-check baseline.
            slot.set_baseline(slot.encode()?);
        }
        self.detached_inserts.borrow_mut().clear();

        Ok(())
    }

    // ------------------------------------------------------------------
    // Association fetches
    // ------------------------------------------------------------------

    /// Targets linked from `source` under `relation`, resolved through the
    /// identity map. A link pointing at a missing row is an error; targets
    /// of another entity type never belong to `E`'s side and are skipped.
    pub fn fetch_linked<E: EntityKind>(
        &self,
        relation: &'static str,
        source: RecordKey,
    ) -> Result<Vec<Tracked<E>>, InternalError> {
        self.ensure_open()?;

        let targets = self.db.with_links(|store| store.targets(relation, source));
        let mut items = Vec::with_capacity(targets.len());
        for target in targets {
            if target.entity != E::ENTITY_NAME {
                continue;
            }
            if let Some(tracked) = self.resolve_link_end::<E>(relation, target.key)? {
                items.push(tracked);
            }
        }

        Ok(items)
    }

    /// Sources linking to `target` under `relation`, resolved through the
    /// identity map.
    pub fn fetch_linked_inverse<E: EntityKind>(
        &self,
        relation: &'static str,
        target: RecordKey,
    ) -> Result<Vec<Tracked<E>>, InternalError> {
        self.ensure_open()?;

        let sources = self.db.with_links(|store| store.sources(relation, target));
        let mut items = Vec::with_capacity(sources.len());
        for source in sources {
            if source.entity != E::ENTITY_NAME {
                continue;
            }
            if let Some(tracked) = self.resolve_link_end::<E>(relation, source.key)? {
                items.push(tracked);
            }
        }

        Ok(items)
    }

    /// Rows of `E` whose `field` holds the owner's key, resolved through
    /// the identity map. Backs foreign-key style collections.
    pub fn fetch_owned<E: EntityKind>(
        &self,
        field: &'static str,
        owner: Key,
    ) -> Result<Vec<Tracked<E>>, InternalError> {
        self.ensure_open()?;

        let mut items = Vec::new();
        for (key, row) in self.db.scan(E::ENTITY_NAME) {
            let stored = row.decode::<E>()?;
            if stored.field(field) != Some(crate::value::Value::Key(owner)) {
                continue;
            }
            if let Some(tracked) = self.resolve::<E>(key)? {
                items.push(tracked);
            }
        }

        Ok(items)
    }
}
