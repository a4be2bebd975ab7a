use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use strata_types::Attributes;

use crate::{Entity, EntityCollection, Target};

/// Caller hook run when a persistence request settles.
///
/// Receives the entity or collection, the backend's response and the
/// options the request was made with.
pub type SyncCallback = Rc<dyn Fn(&Target, &Value, &Options)>;

/// Options accepted by every mutating and persistence operation.
///
/// The same struct travels with the events an operation emits, annotated
/// along the way (`index` on `remove`, `validation_error` on `invalid`,
/// `previous_entities` on `reset`).
#[derive(Clone, Default)]
pub struct Options {
    /// Suppress events for this call.
    pub silent: bool,
    /// Delete the given keys instead of assigning them.
    pub unset: bool,
    /// Run the kind's validation hook before applying.
    pub validate: bool,
    /// Run parse steps on incoming data. Persistence calls default to on.
    pub parse: Option<bool>,
    /// Collection `set`: insert new items. Defaults to on.
    pub add: Option<bool>,
    /// Collection `set`: drop members missing from the input. Defaults to on.
    pub remove: Option<bool>,
    /// Update existing members in place. On for `set`, off for `add`.
    pub merge: Option<bool>,
    /// Collection `set`: `Some(false)` skips comparator ordering.
    pub sort: Option<bool>,
    /// Insert at this position instead of comparator order.
    pub at: Option<usize>,
    /// Defer local effects of a persistence call until the backend succeeds.
    pub wait: bool,
    /// Save only the given attributes with a `patch` request.
    pub patch: bool,
    /// Collection `fetch`: replace contents with `reset` instead of `set`.
    pub reset: bool,
    /// Request payload override.
    pub attrs: Option<Attributes>,
    /// Request location override.
    pub url: Option<String>,
    /// Position of a removed entity, set on `remove` events.
    pub index: Option<usize>,
    /// Validation failure, set on `invalid` events.
    pub validation_error: Option<Value>,
    /// Members before a `reset`, set on `reset` events.
    pub previous_entities: Vec<Entity>,
    /// Owning collection for a newly constructed entity.
    pub collection: Option<EntityCollection>,
    pub success: Option<SyncCallback>,
    pub error: Option<SyncCallback>,
    /// Caller data passed through untouched.
    pub extra: Attributes,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_silent(mut self) -> Self {
        self.silent = true;
        self
    }

    #[must_use]
    pub fn with_unset(mut self) -> Self {
        self.unset = true;
        self
    }

    #[must_use]
    pub fn with_validate(mut self) -> Self {
        self.validate = true;
        self
    }

    #[must_use]
    pub fn with_parse(mut self, parse: bool) -> Self {
        self.parse = Some(parse);
        self
    }

    #[must_use]
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = Some(merge);
        self
    }

    #[must_use]
    pub fn with_add(mut self, add: bool) -> Self {
        self.add = Some(add);
        self
    }

    #[must_use]
    pub fn with_remove(mut self, remove: bool) -> Self {
        self.remove = Some(remove);
        self
    }

    #[must_use]
    pub fn with_at(mut self, at: usize) -> Self {
        self.at = Some(at);
        self
    }

    #[must_use]
    pub fn with_wait(mut self) -> Self {
        self.wait = true;
        self
    }

    #[must_use]
    pub fn with_patch(mut self) -> Self {
        self.patch = true;
        self
    }

    #[must_use]
    pub fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = Some(attrs);
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_collection(mut self, collection: &EntityCollection) -> Self {
        self.collection = Some(collection.clone());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_success(mut self, f: impl Fn(&Target, &Value, &Options) + 'static) -> Self {
        self.success = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn with_error(mut self, f: impl Fn(&Target, &Value, &Options) + 'static) -> Self {
        self.error = Some(Rc::new(f));
        self
    }

    /// Whether parse steps run. Off unless requested; persistence calls
    /// default `parse` to on before this is consulted.
    pub(crate) fn parses(&self) -> bool {
        self.parse.unwrap_or(false)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("silent", &self.silent)
            .field("unset", &self.unset)
            .field("validate", &self.validate)
            .field("parse", &self.parse)
            .field("add", &self.add)
            .field("remove", &self.remove)
            .field("merge", &self.merge)
            .field("at", &self.at)
            .field("wait", &self.wait)
            .field("patch", &self.patch)
            .field("index", &self.index)
            .field("validation_error", &self.validation_error)
            .field("previous_entities", &self.previous_entities.len())
            .field("success", &self.success.is_some())
            .field("error", &self.error.is_some())
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}
