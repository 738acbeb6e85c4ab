use std::{
    any::Any,
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

///
/// Tracked
///
/// Shared, interiorly mutable handle to one entity instance. A session's
/// identity map stores these, so every caller in one unit of work observes
/// the same instance for a given identity. Handles are single-threaded by
/// construction (`Rc` + `RefCell`).
///

pub struct Tracked<E>(Rc<RefCell<E>>);

impl<E: 'static> Tracked<E> {
    #[must_use]
    pub fn new(entity: E) -> Self {
        Self(Rc::new(RefCell::new(entity)))
    }

    #[must_use]
    pub fn borrow(&self) -> Ref<'_, E> {
        self.0.borrow()
    }

    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, E> {
        self.0.borrow_mut()
    }

    pub fn with<R>(&self, f: impl FnOnce(&E) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// True when both handles point at the same in-memory instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_any(&self) -> Rc<dyn Any> {
        self.0.clone()
    }

    pub(crate) fn from_any(any: Rc<dyn Any>) -> Option<Self> {
        any.downcast::<RefCell<E>>().ok().map(Self)
    }
}

impl<E> Clone for Tracked<E> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<E: fmt::Debug> fmt::Debug for Tracked<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entity) => write!(f, "Tracked({entity:?})"),
            Err(_) => f.write_str("Tracked(<borrowed>)"),
        }
    }
}
