use crate::{
    db::session::Tracked,
    error::{ErrorClass, ErrorOrigin, InternalError},
    traits::EntityKind,
};
use thiserror::Error as ThisError;

///
/// ResponseError
///

#[derive(Debug, ThisError)]
pub enum ResponseError {
    #[error("no rows matched for {entity}")]
    NotFound { entity: &'static str },

    #[error("{count} rows matched for {entity}, expected one")]
    NotUnique { entity: &'static str, count: usize },
}

impl From<ResponseError> for InternalError {
    fn from(err: ResponseError) -> Self {
        let class = match err {
            ResponseError::NotFound { .. } => ErrorClass::NotFound,
            ResponseError::NotUnique { .. } => ErrorClass::NotUnique,
        };

        Self::new(class, ErrorOrigin::Response, err.to_string())
    }
}

///
/// Response
///
/// Materialized result of a session-aware query: tracked instances in
/// stored-key order. Shaping helpers turn the row set into the arity the
/// caller asked for.
///

#[derive(Debug)]
pub struct Response<E: EntityKind> {
    items: Vec<Tracked<E>>,
}

impl<E: EntityKind> Response<E> {
    #[must_use]
    pub const fn new(items: Vec<Tracked<E>>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All matches.
    #[must_use]
    pub fn all(self) -> Vec<Tracked<E>> {
        self.items
    }

    /// The first match, if any.
    #[must_use]
    pub fn first(mut self) -> Option<Tracked<E>> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.swap_remove(0))
        }
    }

    /// Exactly one match or a shaping error.
    pub fn one(mut self) -> Result<Tracked<E>, ResponseError> {
        match self.items.len() {
            1 => Ok(self.items.remove(0)),
            0 => Err(ResponseError::NotFound {
                entity: E::ENTITY_NAME,
            }),
            count => Err(ResponseError::NotUnique {
                entity: E::ENTITY_NAME,
                count,
            }),
        }
    }

    /// At most one match; more than one is a shaping error.
    pub fn at_most_one(mut self) -> Result<Option<Tracked<E>>, ResponseError> {
        match self.items.len() {
            0 => Ok(None),
            1 => Ok(Some(self.items.remove(0))),
            count => Err(ResponseError::NotUnique {
                entity: E::ENTITY_NAME,
                count,
            }),
        }
    }
}

impl<E: EntityKind> IntoIterator for Response<E> {
    type Item = Tracked<E>;
    type IntoIter = std::vec::IntoIter<Tracked<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
