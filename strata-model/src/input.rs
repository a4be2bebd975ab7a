use serde_json::Value;
use strata_types::{Attributes, ClientId};

use crate::Entity;

/// Conversion into an attribute bag.
///
/// JSON objects convert to their map; any other value converts to an empty
/// bag, so a parse step that returns a non-object applies nothing.
pub trait IntoAttributes {
    fn into_attributes(self) -> Attributes;
}

impl IntoAttributes for Attributes {
    fn into_attributes(self) -> Attributes {
        self
    }
}

impl IntoAttributes for &Attributes {
    fn into_attributes(self) -> Attributes {
        self.clone()
    }
}

impl IntoAttributes for Value {
    fn into_attributes(self) -> Attributes {
        match self {
            Value::Object(map) => map,
            _ => Attributes::new(),
        }
    }
}

impl IntoAttributes for Option<Attributes> {
    fn into_attributes(self) -> Attributes {
        self.unwrap_or_default()
    }
}

/// One input to a collection `add`, `set` or `reset`.
#[derive(Debug, Clone)]
pub enum Item {
    /// An existing entity, inserted by reference.
    Entity(Entity),
    /// Raw attributes, coerced through the collection's entity kind.
    Attributes(Attributes),
    /// No data: becomes an entity with only defaults.
    Empty,
}

impl Item {
    /// Splits a response into items: arrays yield one item per element,
    /// null yields none and anything else is a single item.
    #[must_use]
    pub fn list(value: Value) -> Vec<Item> {
        match value {
            Value::Array(values) => values.into_iter().map(Item::from).collect(),
            Value::Null => Vec::new(),
            other => vec![Item::from(other)],
        }
    }

    pub(crate) fn is_raw(&self) -> bool {
        !matches!(self, Item::Entity(_))
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            Item::Entity(entity) => entity.to_json(),
            Item::Attributes(attrs) => Value::Object(attrs),
            Item::Empty => Value::Null,
        }
    }
}

impl From<Entity> for Item {
    fn from(entity: Entity) -> Self {
        Item::Entity(entity)
    }
}

impl From<&Entity> for Item {
    fn from(entity: &Entity) -> Self {
        Item::Entity(entity.clone())
    }
}

impl From<Attributes> for Item {
    fn from(attrs: Attributes) -> Self {
        Item::Attributes(attrs)
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Item::Attributes(map),
            _ => Item::Empty,
        }
    }
}

impl<T: Into<Item>> From<Option<T>> for Item {
    fn from(item: Option<T>) -> Self {
        item.map_or(Item::Empty, Into::into)
    }
}

/// A key for resolving a collection member.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Matches the same entity, or one sharing its id.
    Entity(Entity),
    ClientId(ClientId),
    /// Matches by id. A `c<n>` string also matches a client id.
    Id(Value),
    /// Matches by the bag's id attribute.
    Attributes(Attributes),
}

impl From<Entity> for Lookup {
    fn from(entity: Entity) -> Self {
        Lookup::Entity(entity)
    }
}

impl From<&Entity> for Lookup {
    fn from(entity: &Entity) -> Self {
        Lookup::Entity(entity.clone())
    }
}

impl From<ClientId> for Lookup {
    fn from(cid: ClientId) -> Self {
        Lookup::ClientId(cid)
    }
}

impl From<Attributes> for Lookup {
    fn from(attrs: Attributes) -> Self {
        Lookup::Attributes(attrs)
    }
}

impl From<Value> for Lookup {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Lookup::Attributes(map),
            other => Lookup::Id(other),
        }
    }
}

impl From<&str> for Lookup {
    fn from(id: &str) -> Self {
        Lookup::Id(Value::String(id.to_owned()))
    }
}

impl From<String> for Lookup {
    fn from(id: String) -> Self {
        Lookup::Id(Value::String(id))
    }
}

impl From<i64> for Lookup {
    fn from(id: i64) -> Self {
        Lookup::Id(Value::from(id))
    }
}

impl From<Item> for Lookup {
    fn from(item: Item) -> Self {
        match item {
            Item::Entity(entity) => Lookup::Entity(entity),
            Item::Attributes(attrs) => Lookup::Attributes(attrs),
            Item::Empty => Lookup::Id(Value::Null),
        }
    }
}
