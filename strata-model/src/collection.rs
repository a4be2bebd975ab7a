use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Serialize, Serializer};
use serde_json::Value;
use strata_events::{ALL, Callback, EventHub};
use strata_types::{Attributes, ClientId, Error, Result, id_key};
use tracing::debug;

use crate::comparator::sort_by_key;
use crate::event::{change_event, names};
use crate::sync::{self, Method, SyncRequest};
use crate::{
    CollectionKind, Comparator, Entity, IntoAttributes, Item, Lookup, ModelEvent, Options,
    Target,
};

#[derive(Default)]
struct CollectionState {
    entities: Vec<Entity>,
    by_id: HashMap<String, Entity>,
    by_client_id: HashMap<ClientId, Entity>,
    /// The id key each member is indexed under, for rekeying.
    id_keys: HashMap<ClientId, String>,
    comparator: Option<Comparator>,
    /// Depth of merges in progress; member resorts wait for `apply`.
    merging: usize,
}

struct CollectionInner {
    kind: CollectionKind,
    events: EventHub<ModelEvent>,
    /// Registered on every member's hub for the `all` event.
    member: Callback<ModelEvent>,
    state: RefCell<CollectionState>,
}

/// Non-owning reference from an entity back to its collection.
#[derive(Clone)]
pub(crate) struct WeakCollection(Weak<CollectionInner>);

impl WeakCollection {
    pub(crate) fn upgrade(&self) -> Option<EntityCollection> {
        self.0.upgrade().map(|inner| EntityCollection { inner })
    }
}

/// An ordered set of entities indexed by id and client id.
///
/// Member events are re-emitted on the collection's own hub. Like
/// [`Entity`], this is a shared handle and equality is identity.
#[derive(Clone)]
pub struct EntityCollection {
    inner: Rc<CollectionInner>,
}

impl EntityCollection {
    pub fn new(kind: &CollectionKind) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<CollectionInner>| {
            let weak = weak.clone();
            let member = Callback::new(move |name: &str, event: &ModelEvent| {
                if let Some(inner) = weak.upgrade() {
                    EntityCollection { inner }.on_member_event(name, event);
                }
            });
            CollectionInner {
                kind: kind.clone(),
                events: EventHub::new(),
                member,
                state: RefCell::new(CollectionState {
                    comparator: kind.comparator().cloned(),
                    ..CollectionState::default()
                }),
            }
        });
        Self { inner }
    }

    /// A collection seeded with `items` by a silent reset.
    pub fn with_entities<I>(kind: &CollectionKind, items: I, options: Options) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        let collection = Self::new(kind);
        collection.reset(items, Options { silent: true, ..options });
        collection
    }

    #[must_use]
    pub fn kind(&self) -> &CollectionKind {
        &self.inner.kind
    }

    #[must_use]
    pub fn events(&self) -> &EventHub<ModelEvent> {
        &self.inner.events
    }

    pub(crate) fn downgrade(&self) -> WeakCollection {
        WeakCollection(Rc::downgrade(&self.inner))
    }

    // ── Mutation ────────────────────────────────────────────────────

    /// Adds one item. Returns the member it resolved to, or `None` if it
    /// was discarded as invalid.
    pub fn add(&self, item: impl Into<Item>, options: Options) -> Option<Entity> {
        self.add_many([item.into()], options).into_iter().next().flatten()
    }

    /// Adds `items` without removing anything. Existing members are left
    /// alone unless `merge` is requested.
    pub fn add_many<I>(&self, items: I, options: Options) -> Vec<Option<Entity>>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        let mut options = options;
        options.merge.get_or_insert(false);
        options.add = Some(true);
        options.remove = Some(false);
        let items = self.parse_items(items.into_iter().map(Into::into).collect(), &options);
        self.apply(items, options)
    }

    /// Smart update: adds new items, merges existing ones and removes
    /// members missing from `items`, each step switchable through options.
    pub fn set<I>(&self, items: I, options: Options) -> Vec<Option<Entity>>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        let items = self.parse_items(items.into_iter().map(Into::into).collect(), &options);
        self.apply(items, options)
    }

    /// Replaces every member at once, emitting a single `reset`.
    pub fn reset<I>(&self, items: I, options: Options) -> Vec<Option<Entity>>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        let items = self.parse_items(items.into_iter().map(Into::into).collect(), &options);
        self.reset_items(items, options)
    }

    /// Removes one member. Returns it if it was present.
    pub fn remove(&self, item: impl Into<Lookup>, options: Options) -> Option<Entity> {
        self.remove_one(item.into(), &options)
    }

    pub fn remove_many<I>(&self, items: I, options: Options) -> Vec<Option<Entity>>
    where
        I: IntoIterator,
        I::Item: Into<Lookup>,
    {
        items
            .into_iter()
            .map(|item| self.remove_one(item.into(), &options))
            .collect()
    }

    /// Adds at the end, regardless of comparator.
    pub fn push(&self, item: impl Into<Item>, options: Options) -> Option<Entity> {
        let mut options = options;
        options.at.get_or_insert(self.len());
        self.add(item, options)
    }

    /// Removes and returns the last member.
    pub fn pop(&self, options: Options) -> Option<Entity> {
        let last = self.last()?;
        self.remove(last, options)
    }

    /// Adds at the front, regardless of comparator.
    pub fn unshift(&self, item: impl Into<Item>, options: Options) -> Option<Entity> {
        let mut options = options;
        options.at.get_or_insert(0);
        self.add(item, options)
    }

    /// Removes and returns the first member.
    pub fn shift(&self, options: Options) -> Option<Entity> {
        let first = self.first()?;
        self.remove(first, options)
    }

    /// Reorders members by the comparator and emits `sort` unless silent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoComparator`] when no comparator is configured.
    pub fn sort(&self, options: Options) -> Result<()> {
        let comparator = self.comparator().ok_or(Error::NoComparator)?;
        self.sort_with(&comparator);
        if !options.silent {
            self.emit_sorted(&options);
        }
        Ok(())
    }

    #[must_use]
    pub fn comparator(&self) -> Option<Comparator> {
        self.inner.state.borrow().comparator.clone()
    }

    /// Replaces the ordering rule. Existing members are not re-sorted.
    pub fn set_comparator(&self, comparator: Option<Comparator>) {
        self.inner.state.borrow_mut().comparator = comparator;
    }

    // ── Access ──────────────────────────────────────────────────────

    /// Resolves a member by entity, client id, id or attribute bag.
    #[must_use]
    pub fn get(&self, lookup: impl Into<Lookup>) -> Option<Entity> {
        let state = self.inner.state.borrow();
        match lookup.into() {
            Lookup::Entity(entity) => state
                .by_client_id
                .get(&entity.client_id())
                .or_else(|| {
                    entity
                        .id()
                        .as_ref()
                        .and_then(id_key)
                        .and_then(|key| state.by_id.get(&key))
                })
                .cloned(),
            Lookup::ClientId(cid) => state.by_client_id.get(&cid).cloned(),
            Lookup::Id(id) => {
                let key = id_key(&id)?;
                state
                    .by_id
                    .get(&key)
                    .or_else(|| ClientId::parse(&key).and_then(|cid| state.by_client_id.get(&cid)))
                    .cloned()
            }
            Lookup::Attributes(attrs) => attrs
                .get(self.inner.kind.entity_kind().id_attribute())
                .and_then(id_key)
                .and_then(|key| state.by_id.get(&key))
                .cloned(),
        }
    }

    #[must_use]
    pub fn contains(&self, lookup: impl Into<Lookup>) -> bool {
        self.get(lookup).is_some()
    }

    /// The member at `index`; negative indexes count from the end.
    #[must_use]
    pub fn at(&self, index: isize) -> Option<Entity> {
        let state = self.inner.state.borrow();
        let index = if index < 0 {
            state.entities.len().checked_sub(index.unsigned_abs())?
        } else {
            index.unsigned_abs()
        };
        state.entities.get(index).cloned()
    }

    #[must_use]
    pub fn first(&self) -> Option<Entity> {
        self.inner.state.borrow().entities.first().cloned()
    }

    #[must_use]
    pub fn last(&self) -> Option<Entity> {
        self.inner.state.borrow().entities.last().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.borrow().entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().entities.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, entity: &Entity) -> Option<usize> {
        self.inner.state.borrow().entities.iter().position(|e| e == entity)
    }

    /// Members in `start..end`, clamped to the current length.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Vec<Entity> {
        let state = self.inner.state.borrow();
        let end = end.min(state.entities.len());
        let start = start.min(end);
        state.entities[start..end].to_vec()
    }

    /// Snapshot of the members in order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.inner.state.borrow().entities.clone()
    }

    /// The value of `attr` for each member, in order.
    #[must_use]
    pub fn pluck(&self, attr: &str) -> Vec<Option<Value>> {
        self.map(|entity| entity.get(attr))
    }

    /// Members whose attributes equal every entry of `attrs`. An empty bag
    /// matches nothing.
    #[must_use]
    pub fn where_matches(&self, attrs: impl IntoAttributes) -> Vec<Entity> {
        let attrs = attrs.into_attributes();
        if attrs.is_empty() {
            return Vec::new();
        }
        self.filter(|entity| matches_all(entity, &attrs))
    }

    /// First member matching every entry of `attrs`.
    #[must_use]
    pub fn find_where(&self, attrs: impl IntoAttributes) -> Option<Entity> {
        let attrs = attrs.into_attributes();
        if attrs.is_empty() {
            return None;
        }
        self.find(|entity| matches_all(entity, &attrs))
    }

    // Iteration runs over a snapshot, so callbacks may mutate the collection.

    pub fn map<T>(&self, f: impl FnMut(&Entity) -> T) -> Vec<T> {
        self.entities().iter().map(f).collect()
    }

    pub fn filter(&self, mut predicate: impl FnMut(&Entity) -> bool) -> Vec<Entity> {
        self.entities()
            .into_iter()
            .filter(|entity| predicate(entity))
            .collect()
    }

    pub fn find(&self, mut predicate: impl FnMut(&Entity) -> bool) -> Option<Entity> {
        self.entities().into_iter().find(|entity| predicate(entity))
    }

    pub fn any(&self, mut predicate: impl FnMut(&Entity) -> bool) -> bool {
        self.entities().iter().any(|entity| predicate(entity))
    }

    /// Members grouped by the string form of `attr`. Missing values group
    /// under `"null"`.
    #[must_use]
    pub fn group_by(&self, attr: &str) -> BTreeMap<String, Vec<Entity>> {
        let mut groups: BTreeMap<String, Vec<Entity>> = BTreeMap::new();
        for entity in self.entities() {
            groups.entry(group_key(&entity, attr)).or_default().push(entity);
        }
        groups
    }

    /// Members keyed by the string form of `attr`; later members win.
    #[must_use]
    pub fn index_by(&self, attr: &str) -> BTreeMap<String, Entity> {
        self.entities()
            .into_iter()
            .map(|entity| (group_key(&entity, attr), entity))
            .collect()
    }

    /// Members ordered by `attr`, leaving the collection untouched.
    #[must_use]
    pub fn sort_by_attr(&self, attr: &str) -> Vec<Entity> {
        let mut entities = self.entities();
        sort_by_key(&mut entities, |entity| entity.get(attr).unwrap_or(Value::Null));
        entities
    }

    /// A new collection of the same kind and comparator holding the same
    /// entity handles.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let copy = Self::new(&self.inner.kind);
        copy.set_comparator(self.comparator());
        copy.reset(self.entities(), Options::new().with_silent());
        copy
    }

    /// Members serialized in order.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.map(Entity::to_json))
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Resolves the collection's resource location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingUrl`] when the kind has no location.
    pub fn url(&self) -> Result<String> {
        self.inner
            .kind
            .url()
            .map(|url| url.resolve(self))
            .ok_or(Error::MissingUrl)
    }

    /// Hands a request for `method` to the backend.
    ///
    /// # Errors
    ///
    /// Fails when no backend is configured or no location resolves.
    pub fn sync(&self, method: Method, options: Options) -> Result<()> {
        let kind = &self.inner.kind;
        let backend = kind.backend().cloned().ok_or_else(|| {
            Error::MissingBackend(kind.entity_kind().entity_type().to_owned())
        })?;
        let url = match &options.url {
            Some(url) => url.clone(),
            None => self.url()?,
        };
        let payload = method
            .has_payload()
            .then(|| options.attrs.clone().map_or_else(|| self.to_json(), Value::Object));
        sync::send(
            backend.as_ref(),
            SyncRequest {
                method,
                target: Target::Collection(self.clone()),
                url,
                payload,
                options,
            },
        );
        Ok(())
    }

    /// Reads the collection from the backend, then `set`s the parsed
    /// response, or `reset`s with it when `options.reset` is on.
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn fetch(&self, options: Options) -> Result<()> {
        let mut options = options;
        options.parse.get_or_insert(true);
        let caller = options.success.take();
        let collection = self.clone();
        options.success = Some(Rc::new(
            move |_: &Target, response: &Value, opts: &Options| {
                let parsed = if opts.parses() {
                    collection.inner.kind.parse(response.clone(), opts)
                } else {
                    response.clone()
                };
                let items = Item::list(parsed);
                if opts.reset {
                    collection.reset_items(items, opts.clone());
                } else {
                    collection.apply(items, opts.clone());
                }
                if let Some(success) = &caller {
                    success(&Target::Collection(collection.clone()), response, opts);
                }
                let event = ModelEvent::Synced {
                    target: Target::Collection(collection.clone()),
                    response: response.clone(),
                    options: opts.clone(),
                };
                collection.inner.events.trigger(names::SYNC, &event);
            },
        ));
        sync::wrap_error(&Target::Collection(self.clone()), &mut options);
        self.sync(Method::Read, options)
    }

    /// Builds an entity from `item` and saves it.
    ///
    /// The entity joins the collection right away, or once the backend
    /// succeeds with `wait`. Returns `Ok(None)` if `item` was invalid.
    ///
    /// # Errors
    ///
    /// See [`Entity::save`].
    pub fn create(&self, item: impl Into<Item>, options: Options) -> Result<Option<Entity>> {
        let mut options = options;
        let Some(entity) = self.prepare(item.into(), &options) else {
            return Ok(None);
        };
        if !options.wait {
            self.add(&entity, options.clone());
        }

        let wait = options.wait;
        let caller = options.success.take();
        let collection = self.clone();
        options.success = Some(Rc::new(
            move |target: &Target, response: &Value, opts: &Options| {
                if let (true, Some(entity)) = (wait, target.as_entity()) {
                    collection.add(entity, opts.clone());
                }
                if let Some(success) = &caller {
                    success(target, response, opts);
                }
            },
        ));
        entity.save(None, options)?;
        Ok(Some(entity))
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Runs the kind's parse hook over `items` when parsing is requested
    /// and every item is raw data.
    fn parse_items(&self, items: Vec<Item>, options: &Options) -> Vec<Item> {
        if !options.parses() || !items.iter().all(Item::is_raw) {
            return items;
        }
        let raw = Value::Array(items.into_iter().map(Item::into_value).collect());
        Item::list(self.inner.kind.parse(raw, options))
    }

    fn apply(&self, items: Vec<Item>, options: Options) -> Vec<Option<Entity>> {
        let add = options.add.unwrap_or(true);
        let remove = options.remove.unwrap_or(true);
        let merge = options.merge.unwrap_or(true);
        let comparator = self.comparator();
        let sortable = comparator.is_some() && options.at.is_none() && options.sort != Some(false);
        let sort_attr = comparator
            .as_ref()
            .and_then(|c| c.field_name().map(str::to_owned));
        let id_attribute = self.inner.kind.entity_kind().id_attribute().to_owned();

        let mut to_add = Vec::new();
        let mut kept = HashSet::new();
        let mut order = (!sortable && add && remove).then(Vec::new);
        let mut ordered = HashSet::new();
        let mut sort = false;
        let mut results = Vec::with_capacity(items.len());

        for item in items {
            let existing = match &item {
                Item::Entity(entity) => self.get(entity),
                Item::Attributes(attrs) => attrs
                    .get(&id_attribute)
                    .and_then(|id| self.get(Lookup::Id(id.clone()))),
                Item::Empty => None,
            };

            let entity = match existing {
                Some(existing) => {
                    if remove {
                        kept.insert(existing.client_id());
                    }
                    if merge {
                        let mut attrs = match item {
                            Item::Entity(entity) => entity.attributes(),
                            Item::Attributes(attrs) => attrs,
                            Item::Empty => Attributes::new(),
                        };
                        if options.parses() {
                            attrs = existing
                                .parse(Value::Object(attrs), &options)
                                .into_attributes();
                        }
                        self.inner.state.borrow_mut().merging += 1;
                        existing.set(attrs, options.clone());
                        self.inner.state.borrow_mut().merging -= 1;
                        if sortable && !sort {
                            sort = match &sort_attr {
                                Some(attr) => existing.has_changed_attr(attr),
                                None => existing.has_changed(),
                            };
                        }
                    } else {
                        debug!(entity = %existing.client_id(), "skipped existing member");
                    }
                    existing
                }
                None if add => match self.prepare(item, &options) {
                    Some(entity) => {
                        self.add_reference(&entity);
                        to_add.push(entity.clone());
                        entity
                    }
                    None => {
                        results.push(None);
                        continue;
                    }
                },
                None => {
                    results.push(None);
                    continue;
                }
            };

            if let Some(order) = order.as_mut() {
                if ordered.insert(entity.client_id()) {
                    order.push(entity.clone());
                }
            }
            results.push(Some(entity));
        }

        if remove {
            let stale = self.filter(|entity| !kept.contains(&entity.client_id()));
            if !stale.is_empty() {
                self.remove_many(stale, options.clone());
            }
        }

        let reordered = order.as_ref().is_some_and(|order| !order.is_empty());
        if !to_add.is_empty() || reordered {
            if sortable {
                sort = true;
            }
            let mut state = self.inner.state.borrow_mut();
            if let Some(at) = options.at {
                let at = at.min(state.entities.len());
                for (offset, entity) in to_add.iter().enumerate() {
                    state.entities.insert(at + offset, entity.clone());
                }
            } else if let Some(order) = order {
                state.entities = order;
            } else {
                state.entities.extend(to_add.iter().cloned());
            }
        }

        if sort {
            if let Some(comparator) = &comparator {
                self.sort_with(comparator);
            }
        }

        if !options.silent {
            for entity in &to_add {
                let event = ModelEvent::Added {
                    entity: entity.clone(),
                    collection: self.clone(),
                    options: options.clone(),
                };
                entity.events().trigger(names::ADD, &event);
            }
            if sort || reordered {
                self.emit_sorted(&options);
            }
        }
        results
    }

    fn reset_items(&self, items: Vec<Item>, options: Options) -> Vec<Option<Entity>> {
        let previous = self.entities();
        for entity in &previous {
            self.remove_reference(entity);
        }
        {
            let mut state = self.inner.state.borrow_mut();
            state.entities.clear();
            state.by_id.clear();
            state.by_client_id.clear();
            state.id_keys.clear();
        }

        let mut add_options = Options {
            silent: true,
            add: Some(true),
            remove: Some(false),
            ..options.clone()
        };
        add_options.merge.get_or_insert(false);
        let results = self.apply(items, add_options);

        if !options.silent {
            let event = ModelEvent::Reset {
                collection: self.clone(),
                options: Options {
                    previous_entities: previous,
                    ..options
                },
            };
            self.inner.events.trigger(names::RESET, &event);
        }
        results
    }

    /// Turns an item into an entity ready to join, or `None` after
    /// emitting `invalid` on the collection.
    fn prepare(&self, item: Item, options: &Options) -> Option<Entity> {
        let entity = match item {
            Item::Entity(entity) => {
                if !options.validate || entity.is_valid(options.clone()) {
                    return Some(entity);
                }
                entity
            }
            raw => {
                let options = Options {
                    collection: Some(self.clone()),
                    ..options.clone()
                };
                let entity = self.inner.kind.entity_kind().create(raw.into_value(), options);
                if entity.validation_error().is_none() {
                    return Some(entity);
                }
                entity
            }
        };

        let error = entity.validation_error().unwrap_or(Value::Null);
        debug!(entity = %entity.client_id(), %error, "discarded invalid item");
        let event = ModelEvent::Invalid {
            target: Target::Collection(self.clone()),
            error: error.clone(),
            options: Options {
                validation_error: Some(error),
                ..options.clone()
            },
        };
        self.inner.events.trigger(names::INVALID, &event);
        None
    }

    fn remove_one(&self, lookup: Lookup, options: &Options) -> Option<Entity> {
        let entity = self.get(lookup)?;
        let index = {
            let mut state = self.inner.state.borrow_mut();
            let cid = entity.client_id();
            state.by_client_id.remove(&cid);
            if let Some(key) = state.id_keys.remove(&cid) {
                state.by_id.remove(&key);
            }
            let index = state.entities.iter().position(|e| e == &entity);
            if let Some(index) = index {
                state.entities.remove(index);
            }
            index
        };

        if !options.silent {
            let event = ModelEvent::Removed {
                entity: entity.clone(),
                collection: self.clone(),
                options: Options {
                    index,
                    ..options.clone()
                },
            };
            entity.events().trigger(names::REMOVE, &event);
        }
        self.remove_reference(&entity);
        Some(entity)
    }

    fn add_reference(&self, entity: &Entity) {
        {
            let mut state = self.inner.state.borrow_mut();
            let cid = entity.client_id();
            state.by_client_id.insert(cid, entity.clone());
            if let Some(key) = entity.id().as_ref().and_then(id_key) {
                state.by_id.insert(key.clone(), entity.clone());
                state.id_keys.insert(cid, key);
            }
        }
        entity.attach_collection(self);
        self.inner
            .events
            .listen_to(entity.events(), ALL, &self.inner.member);
    }

    fn remove_reference(&self, entity: &Entity) {
        entity.detach_collection(self);
        self.inner.events.stop_listening(
            Some(entity.events()),
            Some(ALL),
            Some(self.inner.member.id()),
        );
    }

    fn on_member_event(&self, name: &str, event: &ModelEvent) {
        if let ModelEvent::Added { collection, .. } | ModelEvent::Removed { collection, .. } =
            event
        {
            if collection != self {
                return;
            }
        }
        if let (names::DESTROY, ModelEvent::Destroyed { entity, options, .. }) = (name, event) {
            self.remove(entity, options.clone());
        }
        if let Some(entity) = event.entity() {
            if name == change_event(entity.kind().id_attribute()) {
                self.rekey(entity);
            }
            if name == names::CHANGE {
                self.resort_after_change(entity);
            }
        }
        self.inner.events.trigger(name, event);
    }

    fn rekey(&self, entity: &Entity) {
        let cid = entity.client_id();
        let key = entity.id().as_ref().and_then(id_key);
        let mut state = self.inner.state.borrow_mut();
        if !state.by_client_id.contains_key(&cid) {
            return;
        }
        if let Some(old) = state.id_keys.remove(&cid) {
            if state.by_id.get(&old) == Some(entity) {
                state.by_id.remove(&old);
            }
        }
        debug!(entity = %cid, id = ?key, "member id changed");
        if let Some(key) = key {
            state.by_id.insert(key.clone(), entity.clone());
            state.id_keys.insert(cid, key);
        }
    }

    fn resort_after_change(&self, entity: &Entity) {
        if !self.inner.kind.schema().resort_on_change || self.inner.state.borrow().merging > 0 {
            return;
        }
        let Some(comparator) = self.comparator() else {
            return;
        };
        if let Some(attr) = comparator.field_name() {
            if !entity.has_changed_attr(attr) {
                return;
            }
        }
        let before = self.entities();
        let mut after = before.clone();
        comparator.sort(self, &mut after);
        if after != before {
            self.inner.state.borrow_mut().entities = after;
            self.emit_sorted(&Options::default());
        }
    }

    /// Sorts a snapshot so comparators may read the collection.
    fn sort_with(&self, comparator: &Comparator) {
        let mut entities = self.entities();
        comparator.sort(self, &mut entities);
        self.inner.state.borrow_mut().entities = entities;
    }

    fn emit_sorted(&self, options: &Options) {
        let event = ModelEvent::Sorted {
            collection: self.clone(),
            options: options.clone(),
        };
        self.inner.events.trigger(names::SORT, &event);
    }
}

fn matches_all(entity: &Entity, attrs: &Attributes) -> bool {
    attrs
        .iter()
        .all(|(key, value)| entity.get(key).as_ref() == Some(value))
}

fn group_key(entity: &Entity, attr: &str) -> String {
    entity
        .get(attr)
        .as_ref()
        .and_then(id_key)
        .unwrap_or_else(|| "null".to_owned())
}

impl Default for EntityCollection {
    fn default() -> Self {
        Self::new(&CollectionKind::default())
    }
}

impl PartialEq for EntityCollection {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for EntityCollection {}

impl fmt::Debug for EntityCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("EntityCollection")
            .field("kind", &self.inner.kind.entity_kind().entity_type())
            .field("len", &state.entities.len())
            .field("comparator", &state.comparator)
            .finish_non_exhaustive()
    }
}

impl Serialize for EntityCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entities())
    }
}
