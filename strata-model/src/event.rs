use serde_json::Value;
use strata_events::EventHub;

use crate::{Entity, EntityCollection, Options};

/// Event names emitted by entities and collections.
pub mod names {
    pub const CHANGE: &str = "change";
    pub const ADD: &str = "add";
    pub const REMOVE: &str = "remove";
    pub const RESET: &str = "reset";
    pub const SORT: &str = "sort";
    pub const DESTROY: &str = "destroy";
    pub const INVALID: &str = "invalid";
    pub const REQUEST: &str = "request";
    pub const SYNC: &str = "sync";
    pub const ERROR: &str = "error";
}

/// Name of the per-attribute change event for `attr`.
#[must_use]
pub fn change_event(attr: &str) -> String {
    format!("{}:{attr}", names::CHANGE)
}

/// The entity or collection an event or request concerns.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Entity(Entity),
    Collection(EntityCollection),
}

impl Target {
    /// The hub events about this target are emitted on.
    #[must_use]
    pub fn events(&self) -> &EventHub<ModelEvent> {
        match self {
            Target::Entity(entity) => entity.events(),
            Target::Collection(collection) => collection.events(),
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Target::Entity(entity) => Some(entity),
            Target::Collection(_) => None,
        }
    }

    #[must_use]
    pub fn as_collection(&self) -> Option<&EntityCollection> {
        match self {
            Target::Collection(collection) => Some(collection),
            Target::Entity(_) => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Target::Entity(entity) => entity.to_json(),
            Target::Collection(collection) => collection.to_json(),
        }
    }
}

/// Payload carried by every entity and collection event.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// `change`: the entity settled after one or more attribute changes.
    Change { entity: Entity, options: Options },
    /// `change:<attr>`: one attribute was touched. `value` is absent when
    /// the attribute was unset.
    Attribute {
        entity: Entity,
        value: Option<Value>,
        options: Options,
    },
    /// `invalid`: validation rejected a set, or a collection discarded an
    /// item that failed validation.
    Invalid {
        target: Target,
        error: Value,
        options: Options,
    },
    /// `add`: `entity` joined `collection`.
    Added {
        entity: Entity,
        collection: EntityCollection,
        options: Options,
    },
    /// `remove`: `entity` left `collection`; `options.index` is its former
    /// position.
    Removed {
        entity: Entity,
        collection: EntityCollection,
        options: Options,
    },
    /// `destroy`: the entity was destroyed.
    Destroyed {
        entity: Entity,
        collection: Option<EntityCollection>,
        options: Options,
    },
    Reset {
        collection: EntityCollection,
        options: Options,
    },
    Sorted {
        collection: EntityCollection,
        options: Options,
    },
    /// `request`: a persistence request is being handed to the backend.
    Request { target: Target, options: Options },
    /// `sync`: a persistence request succeeded.
    Synced {
        target: Target,
        response: Value,
        options: Options,
    },
    /// `error`: a persistence request failed.
    Failed {
        target: Target,
        response: Value,
        options: Options,
    },
    /// Application-defined event data.
    Custom(Value),
}

impl ModelEvent {
    /// The entity this event concerns, if any.
    #[must_use]
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            ModelEvent::Change { entity, .. }
            | ModelEvent::Attribute { entity, .. }
            | ModelEvent::Added { entity, .. }
            | ModelEvent::Removed { entity, .. }
            | ModelEvent::Destroyed { entity, .. } => Some(entity),
            ModelEvent::Invalid { target, .. }
            | ModelEvent::Request { target, .. }
            | ModelEvent::Synced { target, .. }
            | ModelEvent::Failed { target, .. } => target.as_entity(),
            ModelEvent::Reset { .. } | ModelEvent::Sorted { .. } | ModelEvent::Custom(_) => None,
        }
    }

    /// The collection named by this event, if any.
    #[must_use]
    pub fn collection(&self) -> Option<&EntityCollection> {
        match self {
            ModelEvent::Added { collection, .. }
            | ModelEvent::Removed { collection, .. }
            | ModelEvent::Reset { collection, .. }
            | ModelEvent::Sorted { collection, .. } => Some(collection),
            ModelEvent::Destroyed { collection, .. } => collection.as_ref(),
            ModelEvent::Invalid { target, .. }
            | ModelEvent::Request { target, .. }
            | ModelEvent::Synced { target, .. }
            | ModelEvent::Failed { target, .. } => target.as_collection(),
            ModelEvent::Change { .. } | ModelEvent::Attribute { .. } | ModelEvent::Custom(_) => {
                None
            }
        }
    }

    /// The options the emitting operation ran with.
    #[must_use]
    pub fn options(&self) -> Option<&Options> {
        match self {
            ModelEvent::Change { options, .. }
            | ModelEvent::Attribute { options, .. }
            | ModelEvent::Invalid { options, .. }
            | ModelEvent::Added { options, .. }
            | ModelEvent::Removed { options, .. }
            | ModelEvent::Destroyed { options, .. }
            | ModelEvent::Reset { options, .. }
            | ModelEvent::Sorted { options, .. }
            | ModelEvent::Request { options, .. }
            | ModelEvent::Synced { options, .. }
            | ModelEvent::Failed { options, .. } => Some(options),
            ModelEvent::Custom(_) => None,
        }
    }
}
