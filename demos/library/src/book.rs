use crate::{Author, BOOK_AUTHORSHIP};
use quilldb::core::{
    Key, RecordKey,
    db::{
        lazy::LazySet,
        session::{CascadeCtx, Session, Tracked},
    },
    error::InternalError,
    traits::{EntityKind, FieldValues, Relations},
    value::Value,
};
use serde::{Deserialize, Serialize};

///
/// Book
///
/// Inverse side of the authorship relation: its `authors` collection is
/// readable but never cascades saves. Deleting a book only drops its own
/// link rows.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Book {
    pub key: Option<Key>,
    pub title: String,
    pub authors: LazySet<Author>,
}

impl Book {
    #[must_use]
    pub fn new(title: &str) -> Tracked<Self> {
        Tracked::new(Self {
            key: None,
            title: title.to_string(),
            authors: LazySet::new(),
        })
    }

    fn fetch_authors(session: &Session, owner: Key) -> Result<Vec<Tracked<Author>>, InternalError> {
        session.fetch_linked_inverse::<Author>(
            BOOK_AUTHORSHIP,
            RecordKey::new(Self::ENTITY_NAME, owner),
        )
    }
}

impl EntityKind for Book {
    const ENTITY_NAME: &'static str = "book";

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }
}

impl FieldValues for Book {
    const FIELDS: &'static [&'static str] = &["key", "title"];

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "key" => self.key.map(Value::Key),
            "title" => Some(Value::Text(self.title.clone())),
            _ => None,
        }
    }
}

impl Relations for Book {
    fn bind(&self, origin: &Session) {
        if let Some(key) = self.key {
            self.authors.attach(origin, key, Self::fetch_authors);
        }
    }

    fn force_load(&self) -> Result<(), InternalError> {
        self.authors.get()?;
        Ok(())
    }

    fn cascade_delete(&self, ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        if let Some(key) = self.key {
            ctx.unlink_all(BOOK_AUTHORSHIP, RecordKey::new(Self::ENTITY_NAME, key));
        }
        Ok(())
    }
}
