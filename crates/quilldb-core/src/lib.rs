//! Core runtime for QuillDB: entity traits, values, the session-scoped
//! identity map and unit of work, lazy associations, and the row query
//! layer, with the ergonomics exported via the `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod db;
pub mod error;
pub mod serialize;
pub mod traits;
pub mod value;

mod key;

pub use key::{Key, RecordKey};

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No stores, serializers, or internal helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        Key, RecordKey,
        db::{
            Db,
            lazy::LazySet,
            query::{Cmp, Query},
            response::Response,
            session::{CascadeCtx, Session, Tracked},
        },
        error::InternalError,
        traits::{EntityKind, FieldValues, Relations},
        value::Value,
    };
}
