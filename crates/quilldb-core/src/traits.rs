use crate::{
    db::session::{CascadeCtx, Session},
    error::InternalError,
    key::Key,
    value::Value,
};
use serde::{Serialize, de::DeserializeOwned};

///
/// EntityKind
///
/// Full entity contract: a record-like type with an optional surrogate
/// identity (transient until first save), CBOR-serializable row state, and
/// declared relation behavior. Commit-time dirty checking compares encoded
/// rows, so association state must serialize to a constant shape and stay
/// out of `PartialEq`.
///

pub trait EntityKind:
    Clone + PartialEq + Serialize + DeserializeOwned + FieldValues + Relations + 'static
{
    const ENTITY_NAME: &'static str;

    fn key(&self) -> Option<Key>;

    /// Called exactly once per identity assignment by the session.
    fn set_key(&mut self, key: Key);
}

///
/// FieldValues
///
/// Field access by name for predicate evaluation.
///

pub trait FieldValues {
    const FIELDS: &'static [&'static str];

    fn field(&self, name: &str) -> Option<Value>;
}

///
/// Relations
///
/// Per-entity association wiring. Implementations attach lazy fields in
/// `bind`, and enumerate ownership edges for the commit-time cascade.
/// Cascades run only along declared ownership edges, never along
/// non-owning back-references.
///

pub trait Relations: Sized {
    /// Attach this instance's lazy associations to the session that now
    /// tracks it. Called after registration; the instance has a key.
    fn bind(&self, _origin: &Session) {}

    /// Force every association into the loaded state. Used by `refresh`.
    fn force_load(&self) -> Result<(), InternalError> {
        Ok(())
    }

    /// Register loaded children and link rows ahead of a flush.
    fn cascade_save(&self, _ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        Ok(())
    }

    /// Schedule owned rows and link rows for removal ahead of a delete.
    fn cascade_delete(&self, _ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        Ok(())
    }
}
