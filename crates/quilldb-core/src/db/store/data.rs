use crate::{
    error::InternalError,
    key::Key,
    serialize::{deserialize_bounded, serialize},
    traits::EntityKind,
};
use derive_more::{Deref, DerefMut};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Max serialized bytes for a single row to keep value loads bounded.
pub const MAX_ROW_BYTES: usize = 4 * 1024 * 1024;

///
/// DataRegistry
///
/// Entity name to `DataStore`. Stores are created on first touch, so a
/// schema needs no registration step.
///

#[derive(Default)]
pub struct DataRegistry {
    stores: BTreeMap<&'static str, DataStore>,
}

impl DataRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn store(&self, entity: &'static str) -> Option<&DataStore> {
        self.stores.get(entity)
    }

    pub fn store_mut(&mut self, entity: &'static str) -> &mut DataStore {
        self.stores.entry(entity).or_default()
    }
}

///
/// DataStore
///
/// Primary rows for one entity type, ordered by key.
///

#[derive(Default, Deref, DerefMut)]
pub struct DataStore(BTreeMap<Key, RawRow>);

impl DataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

///
/// RawRowError
///

#[derive(Debug, ThisError)]
pub enum RawRowError {
    #[error("row exceeds max size: {len} bytes (limit {MAX_ROW_BYTES})")]
    TooLarge { len: usize },
}

impl From<RawRowError> for InternalError {
    fn from(err: RawRowError) -> Self {
        Self::new(
            crate::error::ErrorClass::Unsupported,
            crate::error::ErrorOrigin::Store,
            err.to_string(),
        )
    }
}

///
/// RawRow
///
/// One stored row as bounded CBOR bytes.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawRow(Vec<u8>);

impl RawRow {
    pub fn try_new(bytes: Vec<u8>) -> Result<Self, RawRowError> {
        if bytes.len() > MAX_ROW_BYTES {
            return Err(RawRowError::TooLarge { len: bytes.len() });
        }
        Ok(Self(bytes))
    }

    /// Encode an entity's current field values.
    pub fn encode<E: EntityKind>(entity: &E) -> Result<Self, InternalError> {
        let bytes = serialize(entity)?;
        Ok(Self::try_new(bytes)?)
    }

    /// Decode into an entity value. Associations come back detached.
    pub fn decode<E: EntityKind>(&self) -> Result<E, InternalError> {
        Ok(deserialize_bounded(&self.0, MAX_ROW_BYTES)?)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
