use crate::{
    db::{
        lazy::LazySet,
        session::{CascadeCtx, Session, Tracked},
    },
    error::InternalError,
    key::Key,
    traits::{EntityKind, FieldValues, Relations},
    value::Value,
};
use serde::{Deserialize, Serialize};

///
/// Person
///
/// Owning side of a foreign-key collection: deleting a person removes
/// their pets, saving a person pulls loaded pets into the unit of work.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Person {
    pub key: Option<Key>,
    pub name: String,
    pub age: u64,
    pub pets: LazySet<Pet>,
}

impl Person {
    pub fn new(name: &str, age: u64) -> Tracked<Self> {
        Tracked::new(Self {
            key: None,
            name: name.to_string(),
            age,
            pets: LazySet::new(),
        })
    }

    fn fetch_pets(session: &Session, owner: Key) -> Result<Vec<Tracked<Pet>>, InternalError> {
        session.fetch_owned::<Pet>("owner", owner)
    }
}

impl EntityKind for Person {
    const ENTITY_NAME: &'static str = "person";

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }
}

impl FieldValues for Person {
    const FIELDS: &'static [&'static str] = &["key", "name", "age"];

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "key" => self.key.map(Value::Key),
            "name" => Some(Value::Text(self.name.clone())),
            "age" => Some(Value::Uint(self.age)),
            _ => None,
        }
    }
}

impl Relations for Person {
    fn bind(&self, origin: &Session) {
        if let Some(key) = self.key {
            self.pets.attach(origin, key, Self::fetch_pets);
        }
    }

    fn force_load(&self) -> Result<(), InternalError> {
        self.pets.get()?;
        Ok(())
    }

    fn cascade_save(&self, ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        if let Some(pets) = self.pets.loaded_items() {
            for pet in pets {
                ctx.save(&pet)?;
            }
        }
        Ok(())
    }

    fn cascade_delete(&self, ctx: &mut CascadeCtx<'_>) -> Result<(), InternalError> {
        let Some(key) = self.key else {
            return Ok(());
        };
        for pet in Self::fetch_pets(ctx.session(), key)? {
            ctx.delete(&pet)?;
        }
        Ok(())
    }
}

///
/// Pet
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Pet {
    pub key: Option<Key>,
    pub owner: Key,
    pub name: String,
}

impl Pet {
    pub fn new(owner: Key, name: &str) -> Tracked<Self> {
        Tracked::new(Self {
            key: None,
            owner,
            name: name.to_string(),
        })
    }
}

impl EntityKind for Pet {
    const ENTITY_NAME: &'static str = "pet";

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }
}

impl FieldValues for Pet {
    const FIELDS: &'static [&'static str] = &["key", "owner", "name"];

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "key" => self.key.map(Value::Key),
            "owner" => Some(Value::Key(self.owner)),
            "name" => Some(Value::Text(self.name.clone())),
            _ => None,
        }
    }
}

impl Relations for Pet {}
