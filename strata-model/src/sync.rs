use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::event::names;
use crate::{ModelEvent, Options, Target};

/// The persistence verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Create,
    Read,
    Update,
    Patch,
    Delete,
}

impl Method {
    /// The conventional HTTP verb for this method.
    #[must_use]
    pub const fn http_verb(self) -> &'static str {
        match self {
            Method::Create => "POST",
            Method::Read => "GET",
            Method::Update => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether requests with this method carry a payload.
    #[must_use]
    pub const fn has_payload(self) -> bool {
        matches!(self, Method::Create | Method::Update | Method::Patch)
    }
}

/// One persistence request handed to a [`SyncBackend`].
///
/// Consuming [`succeed`](Self::succeed) or [`fail`](Self::fail) settles it,
/// so a request settles at most once. A backend may hold on to the request
/// and settle it later.
pub struct SyncRequest {
    pub method: Method,
    pub target: Target,
    pub url: String,
    pub payload: Option<Value>,
    pub options: Options,
}

impl SyncRequest {
    /// Reports success with the backend's response.
    pub fn succeed(self, response: Value) {
        if let Some(success) = &self.options.success {
            success(&self.target, &response, &self.options);
        }
    }

    /// Reports failure with the backend's response.
    pub fn fail(self, response: Value) {
        if let Some(error) = &self.options.error {
            error(&self.target, &response, &self.options);
        }
    }

    /// Settles with `Ok` as success and `Err` as failure.
    pub fn settle(self, outcome: std::result::Result<Value, Value>) {
        match outcome {
            Ok(response) => self.succeed(response),
            Err(response) => self.fail(response),
        }
    }
}

impl fmt::Debug for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// The persistence collaborator.
///
/// Each call must eventually settle the request exactly once, either
/// synchronously or later.
pub trait SyncBackend {
    fn sync(&self, request: SyncRequest);
}

/// Routes failures through the caller's `error` hook, then emits `error`.
pub(crate) fn wrap_error(target: &Target, options: &mut Options) {
    let caller = options.error.take();
    let target = target.clone();
    options.error = Some(Rc::new(move |_: &Target, response: &Value, opts: &Options| {
        if let Some(error) = &caller {
            error(&target, response, opts);
        }
        target.events().trigger(
            names::ERROR,
            &ModelEvent::Failed {
                target: target.clone(),
                response: response.clone(),
                options: opts.clone(),
            },
        );
    }));
}

/// Emits `request` on the target and hands the request to the backend.
pub(crate) fn send(backend: &dyn SyncBackend, request: SyncRequest) {
    debug!(
        method = request.method.http_verb(),
        url = %request.url,
        "sync request"
    );
    request.target.events().trigger(
        names::REQUEST,
        &ModelEvent::Request {
            target: request.target.clone(),
            options: request.options.clone(),
        },
    );
    backend.sync(request);
}
