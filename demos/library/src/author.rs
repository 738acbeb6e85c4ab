use crate::{AuthorAward, BOOK_AUTHORSHIP, Book};
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
/// Author
///
/// Owning side of both associations: awards are held outright through a
/// foreign key, books are shared through the authorship link relation.
/// Saving an author pulls loaded children into the unit of work; deleting
/// one removes awards and books alike.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Author {
    pub key: Option<Key>,
    pub name: String,
    pub awards: LazySet<AuthorAward>,
    pub books: LazySet<Book>,
}

impl Author {
    #[must_use]
    pub fn new(name: &str) -> Tracked<Self> {
        Tracked::new(Self {
            key: None,
            name: name.to_string(),
            awards: LazySet::new(),
            books: LazySet::new(),
        })
    }

    fn fetch_awards(
        session: &Session,
        owner: Key,
    ) -> Result<Vec<Tracked<AuthorAward>>, InternalError> {
        session.fetch_owned::<AuthorAward>("author", owner)
    }

    fn fetch_books(session: &Session, owner: Key) -> Result<Vec<Tracked<Book>>, InternalError> {
        session.fetch_linked::<Book>(BOOK_AUTHORSHIP, RecordKey::new(Self::ENTITY_NAME, owner))
    }
}

impl EntityKind for Author {
    const ENTITY_NAME: &'static str = "author";

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }
}

impl FieldValues for Author {
    const FIELDS: &'static [&'static str] = &["key", "name"];

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "key" => self.key.map(Value::Key),
            "name" => Some(Value::Text(self.name.clone())),
            _ => None,
        }
    }
}

impl Relations for Author {
    fn bind(&self, origin: &Session) {
        if let Some(key) = self.key {
            self.awards.attach(origin, key, Self::fetch_awards);
            self.books.attach(origin, key, Self::fetch_books);
        }
    }

    fn force_load(&self) -> Result<(), InternalError> {
        self.awards.get()?;
        self.books.get()?;
        Ok(())
    }

    fn cascade_save(&self, ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        let Some(key) = self.key else {
            return Ok(());
        };
        if let Some(awards) = self.awards.loaded_items() {
            for award in awards {
                ctx.save(&award)?;
            }
        }
        if let Some(books) = self.books.loaded_items() {
            for book in books {
                let target = ctx.save(&book)?;
                ctx.link(
                    BOOK_AUTHORSHIP,
                    RecordKey::new(Self::ENTITY_NAME, key),
                    RecordKey::new(Book::ENTITY_NAME, target),
                );
            }
        }
        Ok(())
    }

    fn cascade_delete(&self, ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        let Some(key) = self.key else {
            return Ok(());
        };
        for award in Self::fetch_awards(ctx.session(), key)? {
            ctx.delete(&award)?;
        }
        for book in Self::fetch_books(ctx.session(), key)? {
            ctx.delete(&book)?;
        }
        ctx.unlink_all(BOOK_AUTHORSHIP, RecordKey::new(Self::ENTITY_NAME, key));
        Ok(())
    }
}
