//! ## Crate layout
//! - `core`: runtime identity map, unit of work, lazy associations, stores.
//! - `error`: public error taxonomy for callers.
//! - `query`: fluent session-aware and raw query builders.
//! - `session`: caller-facing session handle.
//!
//! The `prelude` module mirrors the surface application code uses.

pub use quilldb_core as core;

pub mod error;
pub mod query;
pub mod session;

pub use error::{Error, ErrorKind, ErrorOrigin, QueryErrorKind, SessionErrorKind};
pub use query::{Cmp, LoadQuery, RawQuery};
pub use session::Session;

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::{
        Cmp, Error, LoadQuery, RawQuery, Session,
        core::{
            Key, RecordKey,
            db::{Db, lazy::LazySet, session::Tracked},
            traits::{EntityKind as _, FieldValues as _, Relations as _},
            value::Value,
        },
    };
    pub use serde::{Deserialize, Serialize};
}
