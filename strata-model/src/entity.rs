use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};
use serde_json::Value;
use strata_events::EventHub;
use strata_types::{Attributes, ClientId, Error, Result, id_key, is_present};
use tracing::{debug, trace};

use crate::collection::WeakCollection;
use crate::event::{change_event, names};
use crate::sync::{self, Method, SyncRequest};
use crate::url::join_id;
use crate::{
    EntityCollection, EntityKind, IntoAttributes, ModelEvent, Options, SyncCallback, Target,
};

#[derive(Default)]
struct EntityState {
    attributes: Attributes,
    /// Keys whose value differs from `previous`, as of the current round.
    changed: Attributes,
    /// Snapshot taken when the outermost `set` began.
    previous: Option<Attributes>,
    validation_error: Option<Value>,
    collection: Option<WeakCollection>,
    /// True while a `set` is on the stack.
    changing: bool,
    /// Options of the latest `set` that still owes a `change` event.
    pending: Option<Options>,
}

struct EntityInner {
    cid: ClientId,
    kind: EntityKind,
    events: EventHub<ModelEvent>,
    state: RefCell<EntityState>,
}

/// A mutable attribute bag with change tracking.
///
/// `Entity` is a handle: clones share state, and equality is identity. Use
/// [`duplicate`](Self::duplicate) for an independent copy.
#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

impl Entity {
    /// Constructs an entity of `kind`.
    ///
    /// With `options.parse` the input goes through the kind's parse hook
    /// first. Schema defaults fill absent keys, the result is set (honoring
    /// `options.validate`), the change record is cleared and the kind's
    /// initializer runs.
    pub fn new(kind: &EntityKind, attrs: impl IntoAttributes, options: Options) -> Self {
        let entity = Self {
            inner: Rc::new(EntityInner {
                cid: ClientId::next(),
                kind: kind.clone(),
                events: EventHub::new(),
                state: RefCell::new(EntityState::default()),
            }),
        };
        if let Some(collection) = &options.collection {
            entity.inner.state.borrow_mut().collection = Some(collection.downgrade());
        }

        let mut attrs = attrs.into_attributes();
        if options.parses() {
            attrs = entity.parse(Value::Object(attrs), &options).into_attributes();
        }
        for (key, value) in kind.defaults() {
            if !attrs.contains_key(key) {
                attrs.insert(key.clone(), value.clone());
            }
        }

        entity.set(attrs, options.clone());
        entity.inner.state.borrow_mut().changed.clear();
        if let Some(behavior) = kind.behavior() {
            behavior.initialize(&entity, &options);
        }
        entity
    }

    /// Constructs an entity of the default kind.
    pub fn from_attributes(attrs: impl IntoAttributes) -> Self {
        Self::new(&EntityKind::default(), attrs, Options::default())
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.inner.cid
    }

    #[must_use]
    pub fn kind(&self) -> &EntityKind {
        &self.inner.kind
    }

    /// The hub this entity's events are emitted on.
    #[must_use]
    pub fn events(&self) -> &EventHub<ModelEvent> {
        &self.inner.events
    }

    /// Current value of the id attribute. Null counts as absent.
    #[must_use]
    pub fn id(&self) -> Option<Value> {
        self.get(self.inner.kind.id_attribute())
            .filter(|value| !value.is_null())
    }

    /// True until the entity has an id.
    #[must_use]
    pub fn is_new(&self) -> bool {
        !self.has(self.inner.kind.id_attribute())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().attributes.get(key).cloned()
    }

    /// True if `key` holds a non-null value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        is_present(self.inner.state.borrow().attributes.get(key))
    }

    /// Snapshot of the current attributes.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.inner.state.borrow().attributes.clone()
    }

    /// The collection this entity was created for or first added to.
    #[must_use]
    pub fn collection(&self) -> Option<EntityCollection> {
        self.inner
            .state
            .borrow()
            .collection
            .as_ref()
            .and_then(WeakCollection::upgrade)
    }

    /// Applies `attrs`, emitting `change:<key>` per touched key and then a
    /// single `change` once every nested `set` has settled.
    ///
    /// Returns false, leaving state untouched, when `options.validate` is on
    /// and the kind's validation rejects the prospective attributes.
    pub fn set(&self, attrs: impl IntoAttributes, options: Options) -> bool {
        let attrs = attrs.into_attributes();
        if !self.validate_with(&attrs, &options) {
            return false;
        }

        let (touched, nested) = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let nested = state.changing;
            state.changing = true;
            if !nested {
                state.previous = Some(state.attributes.clone());
                state.changed.clear();
            }

            let mut touched = Vec::new();
            for (key, value) in attrs {
                let next = (!options.unset).then_some(value);
                if state.attributes.get(&key) != next.as_ref() {
                    touched.push(key.clone());
                }
                let before = state.previous.as_ref().and_then(|p| p.get(&key));
                if before != next.as_ref() {
                    let recorded = next.clone().unwrap_or(Value::Null);
                    state.changed.insert(key.clone(), recorded);
                } else {
                    state.changed.shift_remove(&key);
                }
                match next {
                    Some(value) => {
                        state.attributes.insert(key, value);
                    }
                    None => {
                        state.attributes.shift_remove(&key);
                    }
                }
            }
            if !options.silent && !touched.is_empty() {
                state.pending = Some(options.clone());
            }
            (touched, nested)
        };
        trace!(entity = %self.inner.cid, touched = touched.len(), nested, "set attributes");

        if !options.silent {
            for key in &touched {
                let event = ModelEvent::Attribute {
                    entity: self.clone(),
                    value: self.get(key),
                    options: options.clone(),
                };
                self.inner.events.trigger(&change_event(key), &event);
            }
        }

        if nested {
            return true;
        }
        if !options.silent {
            while let Some(pending) = self.take_pending() {
                let event = ModelEvent::Change {
                    entity: self.clone(),
                    options: pending,
                };
                self.inner.events.trigger(names::CHANGE, &event);
            }
        }

        let mut state = self.inner.state.borrow_mut();
        state.pending = None;
        state.changing = false;
        true
    }

    /// Sets a single attribute.
    pub fn set_attr(&self, key: impl Into<String>, value: Value, options: Options) -> bool {
        let mut attrs = Attributes::new();
        attrs.insert(key.into(), value);
        self.set(attrs, options)
    }

    /// Removes `key`, emitting change events if it was present.
    pub fn unset(&self, key: &str, options: Options) -> bool {
        let mut attrs = Attributes::new();
        attrs.insert(key.to_owned(), Value::Null);
        self.set(attrs, Options { unset: true, ..options })
    }

    /// Removes every attribute in one combined `set`.
    pub fn clear(&self, options: Options) -> bool {
        let attrs: Attributes = self
            .inner
            .state
            .borrow()
            .attributes
            .keys()
            .map(|key| (key.clone(), Value::Null))
            .collect();
        self.set(attrs, Options { unset: true, ..options })
    }

    /// True if anything changed in the latest round of `set`.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        !self.inner.state.borrow().changed.is_empty()
    }

    #[must_use]
    pub fn has_changed_attr(&self, key: &str) -> bool {
        self.inner.state.borrow().changed.contains_key(key)
    }

    /// The keys changed in the latest round, with their new values. Unset
    /// keys map to null.
    #[must_use]
    pub fn changed_attributes(&self) -> Option<Attributes> {
        let state = self.inner.state.borrow();
        (!state.changed.is_empty()).then(|| state.changed.clone())
    }

    /// The entries of `diff` that differ from the baseline: the pre-set
    /// snapshot while a `set` is running, the live attributes otherwise.
    #[must_use]
    pub fn changed_attributes_against(&self, diff: impl IntoAttributes) -> Option<Attributes> {
        let state = self.inner.state.borrow();
        let baseline = match (&state.previous, state.changing) {
            (Some(previous), true) => previous,
            _ => &state.attributes,
        };
        let changed: Attributes = diff
            .into_attributes()
            .into_iter()
            .filter(|(key, value)| baseline.get(key) != Some(value))
            .collect();
        (!changed.is_empty()).then_some(changed)
    }

    /// Value of `key` before the latest round of `set`.
    #[must_use]
    pub fn previous(&self, key: &str) -> Option<Value> {
        self.inner
            .state
            .borrow()
            .previous
            .as_ref()
            .and_then(|previous| previous.get(key).cloned())
    }

    #[must_use]
    pub fn previous_attributes(&self) -> Attributes {
        self.inner.state.borrow().previous.clone().unwrap_or_default()
    }

    /// The value returned by the last failed validation.
    #[must_use]
    pub fn validation_error(&self) -> Option<Value> {
        self.inner.state.borrow().validation_error.clone()
    }

    /// Validates the current attributes, emitting `invalid` on failure.
    pub fn is_valid(&self, options: Options) -> bool {
        self.validate_with(&Attributes::new(), &Options { validate: true, ..options })
    }

    /// A new entity of the same kind with a copy of the current attributes.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self::new(&self.inner.kind, self.attributes(), Options::default())
    }

    /// The serialized-attributes view.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes())
    }

    /// Runs the kind's parse hook, or returns the input unchanged.
    pub fn parse(&self, response: Value, options: &Options) -> Value {
        match self.inner.kind.behavior() {
            Some(behavior) => behavior.parse(response, options),
            None => response,
        }
    }

    /// Resolves this entity's resource location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingUrl`] when neither the kind nor an owning
    /// collection provides a location.
    pub fn url(&self) -> Result<String> {
        let kind = &self.inner.kind;
        if let Some(url) = kind.url() {
            return Ok(url.resolve(self));
        }
        let base = match kind.url_root() {
            Some(root) => root.resolve(self),
            None => self.collection().ok_or(Error::MissingUrl)?.url()?,
        };
        Ok(match self.id().as_ref().and_then(id_key) {
            Some(id) => join_id(base, &id),
            None => base,
        })
    }

    /// Hands a request for `method` to the kind's backend.
    ///
    /// `options.url` overrides the resolved location and `options.attrs`
    /// the payload. Emits `request` first.
    ///
    /// # Errors
    ///
    /// Fails when the kind has no backend or no location resolves.
    pub fn sync(&self, method: Method, options: Options) -> Result<()> {
        let kind = &self.inner.kind;
        let backend = kind
            .backend()
            .cloned()
            .ok_or_else(|| Error::MissingBackend(kind.entity_type().to_owned()))?;
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
                target: Target::Entity(self.clone()),
                url,
                payload,
                options,
            },
        );
        Ok(())
    }

    /// Reads the entity from the backend and sets the parsed response.
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn fetch(&self, options: Options) -> Result<()> {
        let mut options = options;
        options.parse.get_or_insert(true);
        let caller = options.success.take();
        let entity = self.clone();
        options.success = Some(Rc::new(
            move |_: &Target, response: &Value, opts: &Options| {
                let attrs = if opts.parses() {
                    entity.parse(response.clone(), opts)
                } else {
                    response.clone()
                };
                if !entity.set(attrs, opts.clone()) {
                    return;
                }
                if let Some(success) = &caller {
                    success(&Target::Entity(entity.clone()), response, opts);
                }
                entity.emit_synced(response, opts);
            },
        ));
        sync::wrap_error(&Target::Entity(self.clone()), &mut options);
        self.sync(Method::Read, options)
    }

    /// Persists the entity, optionally applying `attrs` first.
    ///
    /// Validation always runs. Without `wait`, `attrs` are set up front;
    /// with `wait` they are only exposed to the backend call and applied
    /// once it succeeds. New entities are created, others updated or, with
    /// `patch`, patched. Returns `Ok(false)` if validation rejected.
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn save(&self, attrs: Option<Attributes>, options: Options) -> Result<bool> {
        let mut options = Options {
            validate: true,
            ..options
        };
        let wait = options.wait;
        let saved = self.attributes();

        match &attrs {
            Some(attrs) if !wait => {
                if !self.set(attrs.clone(), options.clone()) {
                    return Ok(false);
                }
            }
            _ => {
                let empty = Attributes::new();
                if !self.validate_with(attrs.as_ref().unwrap_or(&empty), &options) {
                    return Ok(false);
                }
            }
        }

        let staged = wait && attrs.is_some();
        if let (true, Some(attrs)) = (staged, &attrs) {
            let mut merged = saved.clone();
            merged.extend(attrs.clone());
            self.replace_attributes(merged);
        }

        options.parse.get_or_insert(true);
        let method = if self.is_new() {
            Method::Create
        } else if options.patch {
            Method::Patch
        } else {
            Method::Update
        };
        if method == Method::Patch && options.attrs.is_none() {
            options.attrs = attrs.clone();
        }

        let settled = Rc::new(Cell::new(false));
        let caller = options.success.take();
        let success: SyncCallback = {
            let entity = self.clone();
            let saved = saved.clone();
            let settled = Rc::clone(&settled);
            Rc::new(move |_: &Target, response: &Value, opts: &Options| {
                settled.set(true);
                if staged {
                    entity.replace_attributes(saved.clone());
                }
                let mut server = if opts.parses() {
                    entity.parse(response.clone(), opts)
                } else {
                    response.clone()
                };
                if wait {
                    let mut merged = attrs.clone().unwrap_or_default();
                    merged.extend(server.into_attributes());
                    server = Value::Object(merged);
                }
                if server.is_object() && !entity.set(server, opts.clone()) {
                    return;
                }
                if let Some(success) = &caller {
                    success(&Target::Entity(entity.clone()), response, opts);
                }
                entity.emit_synced(response, opts);
            })
        };
        options.success = Some(success);
        sync::wrap_error(&Target::Entity(self.clone()), &mut options);

        let result = self.sync(method, options);
        if staged && !settled.get() {
            self.replace_attributes(saved);
        }
        result.map(|()| true)
    }

    /// Deletes the entity on the backend and announces `destroy`.
    ///
    /// New entities are destroyed locally and `Ok(false)` is returned.
    /// Otherwise destruction happens right away, or on success with `wait`.
    ///
    /// # Errors
    ///
    /// See [`sync`](Self::sync).
    pub fn destroy(&self, options: Options) -> Result<bool> {
        let mut options = options;
        let wait = options.wait;
        let caller = options.success.take();
        let entity = self.clone();
        let success: SyncCallback = Rc::new(move |_: &Target, response: &Value, opts: &Options| {
            if wait || entity.is_new() {
                entity.finish_destroy(opts);
            }
            if let Some(success) = &caller {
                success(&Target::Entity(entity.clone()), response, opts);
            }
            if !entity.is_new() {
                entity.emit_synced(response, opts);
            }
        });

        if self.is_new() {
            success(&Target::Entity(self.clone()), &Value::Null, &options);
            return Ok(false);
        }

        options.success = Some(success);
        sync::wrap_error(&Target::Entity(self.clone()), &mut options);
        self.sync(Method::Delete, options.clone())?;
        if !wait {
            self.finish_destroy(&options);
        }
        Ok(true)
    }

    fn finish_destroy(&self, options: &Options) {
        self.inner.events.stop_listening(None, None, None);
        let event = ModelEvent::Destroyed {
            entity: self.clone(),
            collection: self.collection(),
            options: options.clone(),
        };
        self.inner.events.trigger(names::DESTROY, &event);
    }

    fn emit_synced(&self, response: &Value, options: &Options) {
        let event = ModelEvent::Synced {
            target: Target::Entity(self.clone()),
            response: response.clone(),
            options: options.clone(),
        };
        self.inner.events.trigger(names::SYNC, &event);
    }

    /// Runs validation over the current attributes merged with `attrs`.
    fn validate_with(&self, attrs: &Attributes, options: &Options) -> bool {
        if !options.validate {
            return true;
        }
        let Some(behavior) = self.inner.kind.behavior() else {
            return true;
        };

        let mut merged = self.attributes();
        for (key, value) in attrs {
            if options.unset {
                merged.shift_remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        let error = behavior.validate(&merged, options);
        self.inner.state.borrow_mut().validation_error = error.clone();
        let Some(error) = error else {
            return true;
        };

        debug!(entity = %self.inner.cid, %error, "validation rejected");
        let event = ModelEvent::Invalid {
            target: Target::Entity(self.clone()),
            error: error.clone(),
            options: Options {
                validation_error: Some(error),
                ..options.clone()
            },
        };
        self.inner.events.trigger(names::INVALID, &event);
        false
    }

    fn take_pending(&self) -> Option<Options> {
        self.inner.state.borrow_mut().pending.take()
    }

    fn replace_attributes(&self, attributes: Attributes) {
        self.inner.state.borrow_mut().attributes = attributes;
    }

    /// Records `collection` as owner unless one is already recorded.
    pub(crate) fn attach_collection(&self, collection: &EntityCollection) {
        let mut state = self.inner.state.borrow_mut();
        let owned = state
            .collection
            .as_ref()
            .is_some_and(|weak| weak.upgrade().is_some());
        if !owned {
            state.collection = Some(collection.downgrade());
        }
    }

    /// Forgets `collection` if it is the recorded owner.
    pub(crate) fn detach_collection(&self, collection: &EntityCollection) {
        if self.collection().as_ref() == Some(collection) {
            self.inner.state.borrow_mut().collection = None;
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Entity")
            .field("cid", &self.inner.cid)
            .field("kind", &self.inner.kind.entity_type())
            .field("attributes", &state.attributes)
            .finish()
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.inner.state.borrow().attributes.serialize(serializer)
    }
}
