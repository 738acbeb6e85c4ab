use crate::{
    db::session::{Session, Tracked},
    error::InternalError,
    key::Key,
    traits::EntityKind,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{cell::RefCell, fmt, rc::Weak};

/// Synchronous association fetch, run through the owning session so the
/// fetched rows land in its identity map.
pub type FetchFn<E> = fn(&Session, Key) -> Result<Vec<Tracked<E>>, InternalError>;

///
/// LazySet
///
/// Multi-valued association with an explicit load state. Contents are
/// fetched on first access, and only while the owning session is open and
/// has not been cleared since binding; outside that window access fails
/// with the uninitialized-association error. The validity window belongs
/// to the session, not to the entity instance.
///

pub struct LazySet<E: EntityKind> {
    state: RefCell<LazyState<E>>,
}

enum LazyState<E: EntityKind> {
    /// No owning session. Freshly decoded rows and new instances start here.
    Detached,

    /// Bound to a session, not yet fetched.
    Unloaded {
        origin: Weak<Session>,
        epoch: u64,
        owner: Key,
        fetch: FetchFn<E>,
    },

    /// Contents materialized.
    Loaded { items: Vec<Tracked<E>> },
}

impl<E: EntityKind> LazySet<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(LazyState::Detached),
        }
    }

    /// An association that already holds in-memory instances, as when
    /// building a transient object graph by hand.
    #[must_use]
    pub fn with(items: Vec<Tracked<E>>) -> Self {
        Self {
            state: RefCell::new(LazyState::Loaded { items }),
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(&*self.state.borrow(), LazyState::Loaded { .. })
    }

    /// Replace the contents outright, as a caller-side assignment.
    pub fn set(&self, items: Vec<Tracked<E>>) {
        *self.state.borrow_mut() = LazyState::Loaded { items };
    }

    /// Wire this association to the session that now tracks its owner.
    /// Called from `Relations::bind`; a `Loaded` state is left alone.
    pub fn attach(&self, origin: &Session, owner: Key, fetch: FetchFn<E>) {
        let mut state = self.state.borrow_mut();
        if matches!(&*state, LazyState::Loaded { .. }) {
            return;
        }
        *state = LazyState::Unloaded {
            origin: origin.weak_handle(),
            epoch: origin.epoch(),
            owner,
            fetch,
        };
    }

    /// Contents, fetching them on first access.
    ///
    /// Fails with the uninitialized-association error when unloaded and the
    /// owning session is gone, closed, or has been cleared since binding.
    pub fn get(&self) -> Result<Vec<Tracked<E>>, InternalError> {
        let (origin, epoch, owner, fetch) = match &*self.state.borrow() {
            LazyState::Loaded { items } => return Ok(items.clone()),
            LazyState::Detached => return Err(InternalError::lazy_uninitialized(E::ENTITY_NAME)),
            LazyState::Unloaded {
                origin,
                epoch,
                owner,
                fetch,
            } => (origin.clone(), *epoch, *owner, *fetch),
        };

        let Some(session) = origin.upgrade() else {
            return Err(InternalError::lazy_uninitialized(E::ENTITY_NAME));
        };
        if !session.is_open() || session.epoch() != epoch {
            return Err(InternalError::lazy_uninitialized(E::ENTITY_NAME));
        }

        let items = fetch(&session, owner)?;
        *self.state.borrow_mut() = LazyState::Loaded {
            items: items.clone(),
        };
        Ok(items)
    }

    /// `Loaded` contents without triggering a fetch.
    #[must_use]
    pub fn loaded_items(&self) -> Option<Vec<Tracked<E>>> {
        match &*self.state.borrow() {
            LazyState::Loaded { items } => Some(items.clone()),
            _ => None,
        }
    }
}

impl<E: EntityKind> Default for LazySet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityKind> Clone for LazySet<E> {
    fn clone(&self) -> Self {
        let state = match &*self.state.borrow() {
            LazyState::Detached => LazyState::Detached,
            LazyState::Unloaded {
                origin,
                epoch,
                owner,
                fetch,
            } => LazyState::Unloaded {
                origin: origin.clone(),
                epoch: *epoch,
                owner: *owner,
                fetch: *fetch,
            },
            LazyState::Loaded { items } => LazyState::Loaded {
                items: items.clone(),
            },
        };
        Self {
            state: RefCell::new(state),
        }
    }
}

// Association state never participates in row equality: dirty checking
// compares stored field values only.
impl<E: EntityKind> PartialEq for LazySet<E> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<E: EntityKind> fmt::Debug for LazySet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match &*self.state.borrow() {
            LazyState::Detached => "detached".to_string(),
            LazyState::Unloaded { owner, .. } => format!("unloaded({owner})"),
            LazyState::Loaded { items } => format!("loaded[{}]", items.len()),
        };
        write!(f, "LazySet<{}>::{tag}", E::ENTITY_NAME)
    }
}

// Rows never persist association state; it always decodes as detached.
impl<E: EntityKind> Serialize for LazySet<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_unit()
    }
}

impl<'de, E: EntityKind> Deserialize<'de> for LazySet<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <() as Deserialize>::deserialize(deserializer)?;
        Ok(Self::new())
    }
}
