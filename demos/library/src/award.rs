use quilldb::core::{
    Key,
    db::session::Tracked,
    traits::{EntityKind, FieldValues, Relations},
    value::Value,
};
use serde::{Deserialize, Serialize};

///
/// AuthorAward
///
/// Owned leaf: lives and dies with its author.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AuthorAward {
    pub key: Option<Key>,
    pub author: Key,
    pub name: String,
}

impl AuthorAward {
    #[must_use]
    pub fn new(author: Key, name: &str) -> Tracked<Self> {
        Tracked::new(Self {
            key: None,
            author,
            name: name.to_string(),
        })
    }
}

impl EntityKind for AuthorAward {
    const ENTITY_NAME: &'static str = "author_award";

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }
}

impl FieldValues for AuthorAward {
    const FIELDS: &'static [&'static str] = &["key", "author", "name"];

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "key" => self.key.map(Value::Key),
            "author" => Some(Value::Key(self.author)),
            "name" => Some(Value::Text(self.name.clone())),
            _ => None,
        }
    }
}

impl Relations for AuthorAward {}
