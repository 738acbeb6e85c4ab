use derive_more::Display;
use quilldb_core::{
    db::response::ResponseError,
    error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    /// Another instance with the same identity was already tracked.
    #[must_use]
    pub fn is_non_unique_object(&self) -> bool {
        self.kind == ErrorKind::Session(SessionErrorKind::NonUniqueObject)
    }

    /// An operation that requires a transient instance got a detached one.
    #[must_use]
    pub fn is_detached_entity(&self) -> bool {
        self.kind == ErrorKind::Session(SessionErrorKind::DetachedEntity)
    }

    /// A lazy association was touched outside its session's validity window.
    #[must_use]
    pub fn is_lazy_initialization(&self) -> bool {
        self.kind == ErrorKind::Session(SessionErrorKind::LazyInitialization)
    }

    /// A required row or match was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::Query(QueryErrorKind::NotFound)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let kind = match err.class {
            ErrorClass::Conflict => ErrorKind::Session(SessionErrorKind::NonUniqueObject),
            ErrorClass::Detached => ErrorKind::Session(SessionErrorKind::DetachedEntity),
            ErrorClass::Unloaded => ErrorKind::Session(SessionErrorKind::LazyInitialization),
            ErrorClass::NotFound => ErrorKind::Query(QueryErrorKind::NotFound),
            ErrorClass::NotUnique => ErrorKind::Query(QueryErrorKind::NotUnique),
            ErrorClass::Unsupported => ErrorKind::Unsupported,
            ErrorClass::Internal => ErrorKind::Internal,
        };

        Self::new(kind, err.origin.into(), err.message)
    }
}

impl From<ResponseError> for Error {
    fn from(err: ResponseError) -> Self {
        let kind = match err {
            ResponseError::NotFound { .. } => ErrorKind::Query(QueryErrorKind::NotFound),
            ResponseError::NotUnique { .. } => ErrorKind::Query(QueryErrorKind::NotUnique),
        };

        Self::new(kind, ErrorOrigin::Response, err.to_string())
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    Session(SessionErrorKind),
    Query(QueryErrorKind),

    /// The operation is not valid in the current state.
    Unsupported,

    /// The caller cannot remediate this.
    Internal,
}

///
/// SessionErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SessionErrorKind {
    /// A different instance with the same identity is already tracked.
    NonUniqueObject,

    /// The instance carries an identity the session does not track.
    DetachedEntity,

    /// A lazy association was touched after close, clear, or detachment.
    LazyInitialization,
}

///
/// QueryErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum QueryErrorKind {
    /// Valid query, but no rows matched where one was required.
    NotFound,

    /// More rows matched than the call shape allows.
    NotUnique,
}

///
/// ErrorOrigin
/// Mirror of the core origin, kept serializable for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Lazy,
    Query,
    Response,
    Serialize,
    Session,
    Store,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Lazy => Self::Lazy,
            CoreErrorOrigin::Query => Self::Query,
            CoreErrorOrigin::Response => Self::Response,
            CoreErrorOrigin::Serialize => Self::Serialize,
            CoreErrorOrigin::Session => Self::Session,
            CoreErrorOrigin::Store => Self::Store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_unique_maps_to_a_session_kind() {
        let err: Error = InternalError::session_non_unique("person", "person(1)").into();
        assert!(err.is_non_unique_object());
        assert_eq!(err.origin, ErrorOrigin::Session);
    }

    #[test]
    fn lazy_maps_to_lazy_initialization() {
        let err: Error = InternalError::lazy_uninitialized("person").into();
        assert!(err.is_lazy_initialization());
    }

    #[test]
    fn response_shaping_maps_to_query_kinds() {
        let err: Error = ResponseError::NotFound { entity: "person" }.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn errors_round_trip_through_cbor() {
        let err: Error = InternalError::session_closed().into();
        let bytes = serde_cbor::to_vec(&err).unwrap();
        let back: Error = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(back.kind, err.kind);
        assert_eq!(back.origin, err.origin);
    }
}
