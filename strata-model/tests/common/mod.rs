//! Shared helpers for model tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;
use strata_model::{
    Attributes, Callback, EntityBehavior, EntityKind, EventHub, Method, ModelEvent, Options,
    SyncBackend, SyncRequest,
};

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Converts a `json!` object literal into an attribute bag.
pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Records the name of every event fired under `names` on `hub`.
pub fn record(hub: &EventHub<ModelEvent>, names: &str) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&log);
    hub.on(
        names,
        &Callback::new(move |name: &str, _: &ModelEvent| l.borrow_mut().push(name.to_owned())),
        None,
    );
    log
}

/// Counts events fired under `names` on `hub`.
pub fn count(hub: &EventHub<ModelEvent>, names: &str) -> Rc<Cell<usize>> {
    let counter = Rc::new(Cell::new(0));
    let c = Rc::clone(&counter);
    hub.on(names, &Callback::new(move |_, _| c.set(c.get() + 1)), None);
    counter
}

// ── Behaviors ───────────────────────────────────────────────────

/// Rejects any bag whose `valid` attribute is `false`.
pub struct RequireValid;

impl EntityBehavior for RequireValid {
    fn validate(&self, attrs: &Attributes, _: &Options) -> Option<Value> {
        (attrs.get("valid") == Some(&Value::Bool(false))).then(|| Value::from("invalid"))
    }
}

/// Unwraps responses shaped like `{"data": {...}}`.
pub struct UnwrapData;

impl EntityBehavior for UnwrapData {
    fn parse(&self, response: Value, _: &Options) -> Value {
        match response {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Object(map)),
            other => other,
        }
    }
}

pub fn validated_kind() -> EntityKind {
    EntityKind::new("validated").with_behavior(RequireValid)
}

// ── Backend ─────────────────────────────────────────────────────

/// How a [`RecordingBackend`] settles incoming requests.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Keep the request for the test to settle later.
    Hold,
    Succeed(Value),
    Fail(Value),
    /// Succeed with the request's own payload.
    Echo,
}

/// What the backend saw for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: Method,
    pub url: String,
    pub payload: Option<Value>,
}

/// In-memory backend that logs every request and settles it per [`Reply`].
pub struct RecordingBackend {
    reply: RefCell<Reply>,
    log: RefCell<Vec<Recorded>>,
    held: RefCell<Vec<SyncRequest>>,
}

impl RecordingBackend {
    pub fn new(reply: Reply) -> Rc<Self> {
        Rc::new(Self {
            reply: RefCell::new(reply),
            log: RefCell::new(Vec::new()),
            held: RefCell::new(Vec::new()),
        })
    }

    pub fn echoing() -> Rc<Self> {
        Self::new(Reply::Echo)
    }

    pub fn holding() -> Rc<Self> {
        Self::new(Reply::Hold)
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.borrow_mut() = reply;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.borrow().clone()
    }

    pub fn last(&self) -> Option<Recorded> {
        self.log.borrow().last().cloned()
    }

    /// Removes and returns the oldest held request.
    pub fn take_held(&self) -> Option<SyncRequest> {
        let mut held = self.held.borrow_mut();
        (!held.is_empty()).then(|| held.remove(0))
    }
}

impl SyncBackend for RecordingBackend {
    fn sync(&self, request: SyncRequest) {
        self.log.borrow_mut().push(Recorded {
            method: request.method,
            url: request.url.clone(),
            payload: request.payload.clone(),
        });
        let reply = self.reply.borrow().clone();
        match reply {
            Reply::Hold => self.held.borrow_mut().push(request),
            Reply::Succeed(response) => request.succeed(response),
            Reply::Fail(response) => request.fail(response),
            Reply::Echo => {
                let response = request
                    .payload
                    .clone()
                    .unwrap_or_else(|| Value::Object(Attributes::new()));
                request.succeed(response);
            }
        }
    }
}
