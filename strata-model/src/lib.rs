//! Observable entity model for Strata.
//!
//! - [`Entity`] holds a keyed attribute bag with change tracking, nested-set
//!   coalescing and opt-in validation
//! - [`EntityCollection`] keeps an ordered, indexed set of entities and
//!   re-broadcasts their events
//! - [`EntityKind`] / [`CollectionKind`] configure both, optionally from a
//!   JSON [`EntitySchema`] / [`CollectionSchema`]
//! - [`SyncBackend`] is the persistence contract consumed by `fetch`,
//!   `save`, `destroy` and `create`
//!
//! Both entities and collections compose an
//! [`EventHub<ModelEvent>`](strata_events::EventHub), reachable through
//! `events()`. Everything is single threaded and synchronous; handlers may
//! re-enter any operation.

mod collection;
mod comparator;
mod entity;
mod event;
mod handler;
mod input;
mod kind;
mod options;
mod schema;
mod sync;
mod url;

pub use collection::EntityCollection;
pub use comparator::Comparator;
pub use entity::Entity;
pub use event::{ModelEvent, Target, change_event, names};
pub use handler::EntityBehavior;
pub use input::{IntoAttributes, Item, Lookup};
pub use kind::{CollectionKind, EntityKind};
pub use options::{Options, SyncCallback};
pub use schema::{CollectionSchema, EntitySchema};
pub use sync::{Method, SyncBackend, SyncRequest};
pub use url::UrlSource;

pub use strata_events::{ALL, Callback, EventHub};
pub use strata_types::{Attributes, ClientId, Error, Result};
