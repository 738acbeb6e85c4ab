use derive_more::Display;
use std::fmt;
use thiserror::Error as ThisError;

///
/// ErrorClass
///
/// Stable failure taxonomy for the runtime. Callers branch on the class,
/// never on message text.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// A different in-memory instance already claims the same identity.
    Conflict,

    /// The instance carries an identity that this session does not track.
    Detached,

    /// An association was touched outside its owning session's window.
    Unloaded,

    /// No row exists for the requested identity.
    NotFound,

    /// Exactly one row was expected, several matched.
    NotUnique,

    /// The call is not valid in the session's current state.
    Unsupported,

    /// The caller cannot remediate this.
    Internal,
}

impl ErrorClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::Detached => "detached",
            Self::Unloaded => "unloaded",
            Self::NotFound => "not_found",
            Self::NotUnique => "not_unique",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// ErrorOrigin
///
/// Subsystem that raised the error.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorOrigin {
    Lazy,
    Query,
    Response,
    Serialize,
    Session,
    Store,
}

///
/// InternalError
///
/// Crate-internal error value with a class + origin taxonomy. The public
/// facade converts these into its caller-facing `Error` type.
///

#[derive(Clone, Debug, ThisError)]
#[error("{origin}: {message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// A different instance with the same identity is already tracked.
    #[must_use]
    pub fn session_non_unique(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::Conflict,
            ErrorOrigin::Session,
            format!("another instance with identity {entity}({key}) is already tracked by this session"),
        )
    }

    /// A detached instance was handed to `persist`.
    #[must_use]
    pub fn session_detached(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::Detached,
            ErrorOrigin::Session,
            format!("detached instance passed to persist: {entity}({key})"),
        )
    }

    /// The operation needs a persisted identity but the instance has none.
    #[must_use]
    pub fn session_transient(entity: &'static str) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Session,
            format!("{entity} instance has no persistent identity"),
        )
    }

    /// The session was closed before the call.
    #[must_use]
    pub fn session_closed() -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Session,
            "session is closed",
        )
    }

    /// Identity-map bookkeeping violated one of its own invariants.
    #[must_use]
    pub fn session_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Session, message)
    }

    // ------------------------------------------------------------------
    // Lazy associations
    // ------------------------------------------------------------------

    /// Association access outside the owning session's validity window.
    #[must_use]
    pub fn lazy_uninitialized(entity: &'static str) -> Self {
        Self::new(
            ErrorClass::Unloaded,
            ErrorOrigin::Lazy,
            format!("cannot initialize {entity} association: owning session is closed or was cleared"),
        )
    }

    // ------------------------------------------------------------------
    // Store
    // ------------------------------------------------------------------

    #[must_use]
    pub fn store_not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Store,
            format!("{entity}({key}): row not found"),
        )
    }

    /// A link row points at a row that no longer exists.
    #[must_use]
    pub fn store_dangling_link(relation: &'static str, key: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::Internal,
            ErrorOrigin::Store,
            format!("link relation {relation} references missing row {key}"),
        )
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    #[must_use]
    pub fn serialize_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Serialize, message)
    }

    // ------------------------------------------------------------------
    // Commit machinery
    // ------------------------------------------------------------------

    #[must_use]
    pub fn commit_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Session, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_is_stable_on_constructors() {
        assert_eq!(
            InternalError::session_non_unique("author", 1).class,
            ErrorClass::Conflict
        );
        assert_eq!(
            InternalError::session_detached("author", 1).class,
            ErrorClass::Detached
        );
        assert_eq!(
            InternalError::lazy_uninitialized("book").class,
            ErrorClass::Unloaded
        );
        assert_eq!(
            InternalError::store_not_found("book", 9).class,
            ErrorClass::NotFound
        );
    }

    #[test]
    fn display_carries_origin_and_message() {
        let err = InternalError::session_closed();
        assert_eq!(err.to_string(), "Session: session is closed");
    }
}
