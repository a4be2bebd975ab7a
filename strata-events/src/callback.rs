use std::fmt;
use std::rc::Rc;

use strata_types::CallbackId;

pub(crate) type HandlerFn<A> = dyn Fn(&str, &A);

pub(crate) enum Target<A> {
    /// A closure invoked directly.
    Function(Rc<HandlerFn<A>>),
    /// A handler looked up by name on the emitting hub at dispatch time.
    Method(String),
    /// A single-use wrapper installed by `once` for one event name.
    Once { event: String, original: Rc<Callback<A>> },
}

impl<A> Clone for Target<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Function(f) => Self::Function(Rc::clone(f)),
            Self::Method(name) => Self::Method(name.clone()),
            Self::Once { event, original } => Self::Once {
                event: event.clone(),
                original: Rc::clone(original),
            },
        }
    }
}

/// An event handler with a stable identity.
///
/// Clones share the same [`CallbackId`], which is what `off` and
/// `stop_listening` match against. Handlers receive the event name and the
/// payload.
pub struct Callback<A> {
    id: CallbackId,
    pub(crate) target: Target<A>,
}

impl<A> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            target: self.target.clone(),
        }
    }
}

impl<A> Callback<A> {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&str, &A) + 'static) -> Self {
        Self {
            id: CallbackId::next(),
            target: Target::Function(Rc::new(f)),
        }
    }

    /// Refers to a handler defined on the emitting hub with
    /// [`EventHub::define`](crate::EventHub::define).
    ///
    /// The name is not checked until the event fires.
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            id: CallbackId::next(),
            target: Target::Method(name.into()),
        }
    }

    pub(crate) fn once(event: &str, original: &Callback<A>) -> Self {
        Self {
            id: CallbackId::next(),
            target: Target::Once {
                event: event.to_owned(),
                original: Rc::new(original.clone()),
            },
        }
    }

    /// Returns this callback's identity.
    #[must_use]
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// True if `id` names this callback or the callback it wraps.
    pub(crate) fn matches(&self, id: CallbackId) -> bool {
        if self.id == id {
            return true;
        }
        match &self.target {
            Target::Once { original, .. } => original.matches(id),
            _ => false,
        }
    }
}

impl<A> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.target {
            Target::Function(_) => "function".to_owned(),
            Target::Method(name) => format!("method:{name}"),
            Target::Once { event, .. } => format!("once:{event}"),
        };
        f.debug_struct("Callback")
            .field("id", &self.id)
            .field("target", &kind)
            .finish()
    }
}
