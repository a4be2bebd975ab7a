use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use strata_types::compare_values;

use crate::{Entity, EntityCollection};

/// A collection ordering rule.
///
/// Key extractors and two-argument comparators are distinct variants; both
/// receive the collection so they can consult it.
pub enum Comparator {
    /// Ascending by one attribute. Missing attributes sort as null.
    Field(String),
    /// Ascending by an extracted key.
    SortKey(Rc<dyn Fn(&EntityCollection, &Entity) -> Value>),
    /// A full comparison function. Must be a total order.
    Compare(Rc<dyn Fn(&EntityCollection, &Entity, &Entity) -> Ordering>),
}

impl Comparator {
    pub fn field(attr: impl Into<String>) -> Self {
        Self::Field(attr.into())
    }

    pub fn sort_key(f: impl Fn(&EntityCollection, &Entity) -> Value + 'static) -> Self {
        Self::SortKey(Rc::new(f))
    }

    pub fn compare(f: impl Fn(&EntityCollection, &Entity, &Entity) -> Ordering + 'static) -> Self {
        Self::Compare(Rc::new(f))
    }

    /// The attribute this comparator reads, for field comparators.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Field(attr) => Some(attr),
            _ => None,
        }
    }

    /// Stable sort of `entities`. Keys are extracted once per entity.
    pub(crate) fn sort(&self, collection: &EntityCollection, entities: &mut Vec<Entity>) {
        match self {
            Self::Field(attr) => sort_by_key(entities, |entity| {
                entity.get(attr).unwrap_or(Value::Null)
            }),
            Self::SortKey(f) => sort_by_key(entities, |entity| f(collection, entity)),
            Self::Compare(f) => entities.sort_by(|a, b| f(collection, a, b)),
        }
    }
}

pub(crate) fn sort_by_key(entities: &mut Vec<Entity>, mut key: impl FnMut(&Entity) -> Value) {
    let mut keyed: Vec<(Value, Entity)> = entities
        .drain(..)
        .map(|entity| (key(&entity), entity))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare_values(a, b));
    entities.extend(keyed.into_iter().map(|(_, entity)| entity));
}

impl Clone for Comparator {
    fn clone(&self) -> Self {
        match self {
            Self::Field(attr) => Self::Field(attr.clone()),
            Self::SortKey(f) => Self::SortKey(Rc::clone(f)),
            Self::Compare(f) => Self::Compare(Rc::clone(f)),
        }
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(attr) => f.debug_tuple("Field").field(attr).finish(),
            Self::SortKey(_) => f.write_str("SortKey(..)"),
            Self::Compare(_) => f.write_str("Compare(..)"),
        }
    }
}

impl From<&str> for Comparator {
    fn from(attr: &str) -> Self {
        Self::Field(attr.to_owned())
    }
}

impl From<String> for Comparator {
    fn from(attr: String) -> Self {
        Self::Field(attr)
    }
}
