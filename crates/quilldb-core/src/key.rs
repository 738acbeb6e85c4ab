use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// Key
///
/// Surrogate numeric primary key. Assigned once per persisted row from a
/// per-entity sequence; never reused, even across deletes.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Key(u64);

impl Key {
    /// Fixed serialized size in bytes.
    pub const STORED_SIZE: usize = 8;

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Big-endian encoding so byte order matches numeric order.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; Self::STORED_SIZE] {
        self.0.to_be_bytes()
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::STORED_SIZE]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

///
/// RecordKey
///
/// (entity, key) pair. Addresses one stored row and doubles as the
/// identity-map key, so one in-memory instance per pair is enforceable.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{entity}({key})")]
pub struct RecordKey {
    pub entity: &'static str,
    pub key: Key,
}

impl RecordKey {
    #[must_use]
    pub const fn new(entity: &'static str, key: Key) -> Self {
        Self { entity, key }
    }
}
