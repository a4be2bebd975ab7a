use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use strata_types::Attributes;

use crate::url::UrlSource;
use crate::{
    CollectionSchema, Comparator, Entity, EntityBehavior, EntityCollection, EntitySchema,
    IntoAttributes, Options, SyncBackend,
};

/// Configuration shared by every entity of one kind.
///
/// Serializable settings come from an [`EntitySchema`]; hooks and
/// collaborators are attached with the `with_*` builders.
#[derive(Clone)]
pub struct EntityKind {
    schema: Rc<EntitySchema>,
    behavior: Option<Rc<dyn EntityBehavior>>,
    backend: Option<Rc<dyn SyncBackend>>,
    url_root: Option<UrlSource<Entity>>,
    url: Option<UrlSource<Entity>>,
}

impl EntityKind {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self::from_schema(EntitySchema::new(entity_type))
    }

    pub fn from_schema(schema: EntitySchema) -> Self {
        let url_root = schema.url_root.clone().map(UrlSource::Fixed);
        Self {
            schema: Rc::new(schema),
            behavior: None,
            backend: None,
            url_root,
            url: None,
        }
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: impl EntityBehavior + 'static) -> Self {
        self.behavior = Some(Rc::new(behavior));
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Rc<dyn SyncBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Computes the base location from the entity instead of the schema.
    #[must_use]
    pub fn with_url_root_fn(mut self, f: impl Fn(&Entity) -> String + 'static) -> Self {
        self.url_root = Some(UrlSource::computed(f));
        self
    }

    /// Computes the full location, bypassing `url_root` and the collection.
    #[must_use]
    pub fn with_url_fn(mut self, f: impl Fn(&Entity) -> String + 'static) -> Self {
        self.url = Some(UrlSource::computed(f));
        self
    }

    /// Constructs an entity of this kind.
    pub fn create(&self, attrs: impl IntoAttributes, options: Options) -> Entity {
        Entity::new(self, attrs, options)
    }

    #[must_use]
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.schema.entity_type
    }

    #[must_use]
    pub fn id_attribute(&self) -> &str {
        &self.schema.id_attribute
    }

    #[must_use]
    pub fn defaults(&self) -> &Attributes {
        &self.schema.defaults
    }

    pub(crate) fn behavior(&self) -> Option<&dyn EntityBehavior> {
        self.behavior.as_deref()
    }

    pub(crate) fn backend(&self) -> Option<&Rc<dyn SyncBackend>> {
        self.backend.as_ref()
    }

    pub(crate) fn url_root(&self) -> Option<&UrlSource<Entity>> {
        self.url_root.as_ref()
    }

    pub(crate) fn url(&self) -> Option<&UrlSource<Entity>> {
        self.url.as_ref()
    }

    /// True if both handles configure the same kind.
    #[must_use]
    pub fn same_kind(&self, other: &EntityKind) -> bool {
        Rc::ptr_eq(&self.schema, &other.schema)
    }
}

impl Default for EntityKind {
    fn default() -> Self {
        Self::new("entity")
    }
}

impl fmt::Debug for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityKind")
            .field("schema", &self.schema)
            .field("behavior", &self.behavior.is_some())
            .field("backend", &self.backend.is_some())
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

type ParseFn = Rc<dyn Fn(Value, &Options) -> Value>;

/// Configuration shared by every collection of one kind.
#[derive(Clone)]
pub struct CollectionKind {
    schema: CollectionSchema,
    entity_kind: EntityKind,
    comparator: Option<Comparator>,
    url: Option<UrlSource<EntityCollection>>,
    parse: Option<ParseFn>,
    backend: Option<Rc<dyn SyncBackend>>,
}

impl CollectionKind {
    /// A collection of `entity_kind` with no comparator.
    pub fn new(entity_kind: &EntityKind) -> Self {
        Self::from_schema(CollectionSchema::default(), entity_kind)
    }

    pub fn from_schema(schema: CollectionSchema, entity_kind: &EntityKind) -> Self {
        let comparator = schema.comparator.clone().map(Comparator::Field);
        let url = schema.url.clone().map(UrlSource::Fixed);
        Self {
            schema,
            entity_kind: entity_kind.clone(),
            comparator,
            url,
            parse: None,
            backend: None,
        }
    }

    #[must_use]
    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Reshapes raw input into the list of items to apply.
    #[must_use]
    pub fn with_parse(mut self, f: impl Fn(Value, &Options) -> Value + 'static) -> Self {
        self.parse = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(UrlSource::Fixed(url.into()));
        self
    }

    #[must_use]
    pub fn with_url_fn(mut self, f: impl Fn(&EntityCollection) -> String + 'static) -> Self {
        self.url = Some(UrlSource::computed(f));
        self
    }

    /// Backend for collection requests. Falls back to the entity kind's.
    #[must_use]
    pub fn with_backend(mut self, backend: Rc<dyn SyncBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_resort_on_change(mut self, resort: bool) -> Self {
        self.schema.resort_on_change = resort;
        self
    }

    #[must_use]
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    #[must_use]
    pub fn entity_kind(&self) -> &EntityKind {
        &self.entity_kind
    }

    #[must_use]
    pub fn comparator(&self) -> Option<&Comparator> {
        self.comparator.as_ref()
    }

    pub(crate) fn parse(&self, response: Value, options: &Options) -> Value {
        match &self.parse {
            Some(f) => f(response, options),
            None => response,
        }
    }

    pub(crate) fn backend(&self) -> Option<&Rc<dyn SyncBackend>> {
        self.backend.as_ref().or(self.entity_kind.backend())
    }

    pub(crate) fn url(&self) -> Option<&UrlSource<EntityCollection>> {
        self.url.as_ref()
    }
}

impl Default for CollectionKind {
    fn default() -> Self {
        Self::new(&EntityKind::default())
    }
}

impl fmt::Debug for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionKind")
            .field("schema", &self.schema)
            .field("entity_kind", &self.entity_kind)
            .field("comparator", &self.comparator)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
