use crate::{
    db::{
        session::{CascadeCtx, Session, Tracked},
        store::RawRow,
    },
    error::InternalError,
    key::Key,
    traits::{EntityKind, Relations},
};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    marker::PhantomData,
    rc::Rc,
};

///
/// Pending
///
/// Write intent buffered for an identity-map entry. Nothing reaches the
/// stores until commit.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pending {
    /// Tracked with no buffered write. Commit still compares the current
    /// state against the stored row and flushes a change when they differ.
    Clean,

    /// Row does not exist yet; commit inserts it.
    Insert,

    /// Commit rewrites the row from the current in-memory state.
    Update,

    /// Commit removes the row.
    Delete,
}

///
/// TrackedSlot
///
/// One identity-map entry: the shared instance handle (type-erased), its
/// buffered write intent, the row bytes it was loaded from, and the
/// operations the session needs without knowing the entity type.
///

#[derive(Clone)]
pub struct TrackedSlot {
    handle: Rc<dyn Any>,
    pending: Rc<Cell<Pending>>,
    baseline: Rc<RefCell<Option<RawRow>>>,
    ops: Rc<dyn SlotOps>,
}

impl TrackedSlot {
    pub fn new<E: EntityKind>(tracked: &Tracked<E>, pending: Pending) -> Self {
        Self {
            handle: tracked.as_any(),
            pending: Rc::new(Cell::new(pending)),
            baseline: Rc::new(RefCell::new(None)),
            ops: Rc::new(TypedSlot::<E>(PhantomData)),
        }
    }

    /// The typed handle, when the caller's entity type matches.
    #[must_use]
    pub fn typed<E: EntityKind>(&self) -> Option<Tracked<E>> {
        Tracked::from_any(Rc::clone(&self.handle))
    }

    #[must_use]
    pub fn pending(&self) -> Pending {
        self.pending.get()
    }

    pub fn set_pending(&self, pending: Pending) {
        self.pending.set(pending);
    }

    /// The row bytes this slot's state was last loaded from or flushed as.
    /// A clean slot is dirty only when its current encoding differs from
    /// this, never from whatever happens to be stored at commit time.
    #[must_use]
    pub fn baseline(&self) -> Option<RawRow> {
        self.baseline.borrow().clone()
    }

    pub fn set_baseline(&self, row: RawRow) {
        *self.baseline.borrow_mut() = Some(row);
    }

    // ---- type-erased dispatch ----

    pub fn encode(&self) -> Result<RawRow, InternalError> {
        self.ops.encode(&self.handle)
    }

    #[must_use]
    pub fn key(&self) -> Option<Key> {
        self.ops.key(&self.handle)
    }

    pub fn bind(&self, session: &Session) {
        self.ops.bind(&self.handle, session);
    }

    pub fn force_load(&self) -> Result<(), InternalError> {
        self.ops.force_load(&self.handle)
    }

    pub fn cascade_save(&self, ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        self.ops.cascade_save(&self.handle, ctx)
    }

    pub fn cascade_delete(&self, ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        self.ops.cascade_delete(&self.handle, ctx)
    }
}

///
/// SlotOps
///
/// Per-entity-type operations recovered from a type-erased slot handle.
///

trait SlotOps {
    fn encode(&self, handle: &Rc<dyn Any>) -> Result<RawRow, InternalError>;
    fn key(&self, handle: &Rc<dyn Any>) -> Option<Key>;
    fn bind(&self, handle: &Rc<dyn Any>, session: &Session);
    fn force_load(&self, handle: &Rc<dyn Any>) -> Result<(), InternalError>;
    fn cascade_save(
        &self,
        handle: &Rc<dyn Any>,
        ctx: &mut CascadeCtx<'_>,
    ) -> Result<(), InternalError>;
    fn cascade_delete(
        &self,
        handle: &Rc<dyn Any>,
        ctx: &mut CascadeCtx<'_>,
    ) -> Result<(), InternalError>;
}

struct TypedSlot<E: EntityKind>(PhantomData<E>);

impl<E: EntityKind> TypedSlot<E> {
    fn recover(handle: &Rc<dyn Any>) -> Result<Tracked<E>, InternalError> {
        Tracked::from_any(Rc::clone(handle)).ok_or_else(|| {
            InternalError::session_internal(format!(
                "slot handle does not hold {}",
                E::ENTITY_NAME
            ))
        })
    }
}

impl<E: EntityKind> SlotOps for TypedSlot<E> {
    fn encode(&self, handle: &Rc<dyn Any>) -> Result<RawRow, InternalError> {
        let tracked = Self::recover(handle)?;
        let row = tracked.with(RawRow::encode)?;

        Ok(row)
    }

    fn key(&self, handle: &Rc<dyn Any>) -> Option<Key> {
        let tracked = Tracked::<E>::from_any(Rc::clone(handle))?;
        let key = tracked.with(E::key);

        key
    }

    fn bind(&self, handle: &Rc<dyn Any>, session: &Session) {
        if let Some(tracked) = Tracked::<E>::from_any(Rc::clone(handle)) {
            tracked.with(|entity| entity.bind(session));
        }
    }

    fn force_load(&self, handle: &Rc<dyn Any>) -> Result<(), InternalError> {
        let tracked = Self::recover(handle)?;
        tracked.with(Relations::force_load)
    }

    fn cascade_save(
        &self,
        handle: &Rc<dyn Any>,
        ctx: &mut CascadeCtx<'_>,
    ) -> Result<(), InternalError> {
        let tracked = Self::recover(handle)?;
        tracked.with(|entity| entity.cascade_save(ctx))
    }

    fn cascade_delete(
        &self,
        handle: &Rc<dyn Any>,
        ctx: &mut CascadeCtx<'_>,
    ) -> Result<(), InternalError> {
        let tracked = Self::recover(handle)?;
        tracked.with(|entity| entity.cascade_delete(ctx))
    }
}
