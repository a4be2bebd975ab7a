use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use strata_types::{CallbackId, Error, ListenId, Result};
use tracing::trace;

use crate::callback::{Callback, HandlerFn, Target};

/// Virtual event name whose listeners receive every trigger.
pub const ALL: &str = "all";

struct Registration<A> {
    callback: Callback<A>,
    context: Option<ListenId>,
    /// Cleared on removal so an in-flight dispatch skips it.
    live: Cell<bool>,
}

struct Registry<A> {
    listen_id: Option<ListenId>,
    events: HashMap<String, Vec<Rc<Registration<A>>>>,
    methods: HashMap<String, Rc<HandlerFn<A>>>,
    listening_to: BTreeMap<ListenId, Box<dyn Tracked>>,
}

impl<A> Default for Registry<A> {
    fn default() -> Self {
        Self {
            listen_id: None,
            events: HashMap::new(),
            methods: HashMap::new(),
            listening_to: BTreeMap::new(),
        }
    }
}

impl<A> Registry<A> {
    fn remove_matching(
        &mut self,
        name: Option<&str>,
        callback: Option<CallbackId>,
        context: Option<ListenId>,
    ) {
        if name.is_none() && callback.is_none() && context.is_none() {
            for registration in self.events.values().flatten() {
                registration.live.set(false);
            }
            self.events.clear();
            return;
        }

        let names: Vec<String> = match name {
            Some(names) => names.split_whitespace().map(str::to_owned).collect(),
            None => self.events.keys().cloned().collect(),
        };

        for name in names {
            let Some(registrations) = self.events.get_mut(&name) else {
                continue;
            };
            registrations.retain(|registration| {
                let keep = callback.is_some_and(|id| !registration.callback.matches(id))
                    || context.is_some_and(|ctx| registration.context != Some(ctx));
                if !keep {
                    registration.live.set(false);
                }
                keep
            });
            if registrations.is_empty() {
                self.events.remove(&name);
            }
        }
    }

    fn has_context(&self, context: ListenId) -> bool {
        self.events
            .values()
            .flatten()
            .any(|registration| registration.context == Some(context))
    }
}

/// A hub tracked by a subscriber, held weakly so listen relationships
/// never keep an emitter alive.
trait Tracked {
    fn retract(&self, name: Option<&str>, callback: Option<CallbackId>, context: ListenId);
    fn is_tracking(&self, context: ListenId) -> bool;
}

struct TrackedHub<A>(Weak<RefCell<Registry<A>>>);

impl<A> Tracked for TrackedHub<A> {
    fn retract(&self, name: Option<&str>, callback: Option<CallbackId>, context: ListenId) {
        if let Some(inner) = self.0.upgrade() {
            inner
                .borrow_mut()
                .remove_matching(name, callback, Some(context));
        }
    }

    fn is_tracking(&self, context: ListenId) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| inner.borrow().has_context(context))
    }
}

/// Anything that can be the emitter side of a listen relationship.
pub trait Emitter {
    /// The emitter's listen id, if it has ever been listened to.
    fn existing_listen_id(&self) -> Option<ListenId>;
}

/// Named-event registration and synchronous dispatch.
///
/// Cloning an `EventHub` yields another handle to the same registry;
/// equality is identity.
pub struct EventHub<A> {
    inner: Rc<RefCell<Registry<A>>>,
}

impl<A> Clone for EventHub<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> PartialEq for EventHub<A> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A> Default for EventHub<A> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry::default())),
        }
    }
}

impl<A> fmt::Debug for EventHub<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.borrow();
        let mut names: Vec<&String> = registry.events.keys().collect();
        names.sort();
        f.debug_struct("EventHub")
            .field("listen_id", &registry.listen_id)
            .field("events", &names)
            .field("listening_to", &registry.listening_to.len())
            .finish()
    }
}

impl<A> Emitter for EventHub<A> {
    fn existing_listen_id(&self) -> Option<ListenId> {
        self.inner.borrow().listen_id
    }
}

impl<A: 'static> EventHub<A> {
    /// Creates a hub with no registrations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this hub's listen id, assigning one on first use.
    pub fn listen_id(&self) -> ListenId {
        *self
            .inner
            .borrow_mut()
            .listen_id
            .get_or_insert_with(ListenId::next)
    }

    /// Registers `callback` under each space-separated name in `names`.
    pub fn on(&self, names: &str, callback: &Callback<A>, context: Option<ListenId>) -> &Self {
        let mut registry = self.inner.borrow_mut();
        for name in names.split_whitespace() {
            registry
                .events
                .entry(name.to_owned())
                .or_default()
                .push(Rc::new(Registration {
                    callback: callback.clone(),
                    context,
                    live: Cell::new(true),
                }));
        }
        self
    }

    /// Map form of [`on`](Self::on).
    pub fn on_each<'a>(
        &self,
        map: impl IntoIterator<Item = (&'a str, &'a Callback<A>)>,
        context: Option<ListenId>,
    ) -> &Self {
        for (names, callback) in map {
            self.on(names, callback, context);
        }
        self
    }

    /// Registers `callback` to run at most once per name.
    ///
    /// The registration removes itself before the callback runs. Passing the
    /// original callback's id to [`off`](Self::off) also removes it.
    pub fn once(&self, names: &str, callback: &Callback<A>, context: Option<ListenId>) -> &Self {
        for name in names.split_whitespace() {
            self.on(name, &Callback::once(name, callback), context);
        }
        self
    }

    /// Defines a named handler for [`Callback::method`] registrations.
    pub fn define(&self, method: impl Into<String>, f: impl Fn(&str, &A) + 'static) -> &Self {
        self.inner
            .borrow_mut()
            .methods
            .insert(method.into(), Rc::new(f));
        self
    }

    /// Removes registrations matching every provided filter.
    ///
    /// With no filters at all, every registration is removed. Without a
    /// name, every known event name is considered.
    pub fn off(
        &self,
        name: Option<&str>,
        callback: Option<CallbackId>,
        context: Option<ListenId>,
    ) -> &Self {
        self.inner
            .borrow_mut()
            .remove_matching(name, callback, context);
        self
    }

    /// Map form of [`off`](Self::off).
    pub fn off_each<'a>(
        &self,
        map: impl IntoIterator<Item = (&'a str, CallbackId)>,
        context: Option<ListenId>,
    ) -> &Self {
        for (names, callback) in map {
            self.off(Some(names), Some(callback), context);
        }
        self
    }

    /// Dispatches each space-separated event in `names`.
    ///
    /// # Panics
    ///
    /// Panics if a [`Callback::method`] registration names a handler that
    /// was never defined. Use [`try_trigger`](Self::try_trigger) to get the
    /// error instead.
    pub fn trigger(&self, names: &str, args: &A) -> &Self {
        if let Err(err) = self.try_trigger(names, args) {
            panic!("{err}");
        }
        self
    }

    /// Like [`trigger`](Self::trigger) but stops at, and returns, the first
    /// unresolved handler.
    pub fn try_trigger(&self, names: &str, args: &A) -> Result<()> {
        for name in names.split_whitespace() {
            self.dispatch(name, args)?;
        }
        Ok(())
    }

    /// Map form of [`trigger`](Self::trigger).
    pub fn trigger_each<'a>(&self, map: impl IntoIterator<Item = (&'a str, &'a A)>) -> &Self
    where
        A: 'a,
    {
        for (names, args) in map {
            self.trigger(names, args);
        }
        self
    }

    fn dispatch(&self, name: &str, args: &A) -> Result<()> {
        let (named, all) = {
            let registry = self.inner.borrow();
            (
                registry.events.get(name).cloned().unwrap_or_default(),
                registry.events.get(ALL).cloned().unwrap_or_default(),
            )
        };
        if named.is_empty() && all.is_empty() {
            return Ok(());
        }
        trace!(event = name, handlers = named.len() + all.len(), "dispatching event");

        for registration in named.iter().chain(all.iter()) {
            if registration.live.get() {
                self.invoke(&registration.callback, name, args)?;
            }
        }
        Ok(())
    }

    fn invoke(&self, callback: &Callback<A>, name: &str, args: &A) -> Result<()> {
        match &callback.target {
            Target::Function(f) => {
                f(name, args);
                Ok(())
            }
            Target::Method(method) => {
                let handler = self.inner.borrow().methods.get(method).cloned();
                let handler = handler.ok_or_else(|| Error::UnresolvedHandler(method.clone()))?;
                handler(name, args);
                Ok(())
            }
            Target::Once { event, original } => {
                self.off(Some(event), Some(callback.id()), None);
                self.invoke(original, name, args)
            }
        }
    }

    /// Number of live registrations under `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.inner
            .borrow()
            .events
            .get(name)
            .map_or(0, Vec::len)
    }

    /// True if any registration exists at all.
    #[must_use]
    pub fn has_listeners(&self) -> bool {
        !self.inner.borrow().events.is_empty()
    }

    /// Subscribes this hub to `emitter`'s events, tracking the relationship
    /// so [`stop_listening`](Self::stop_listening) can retract it.
    pub fn listen_to<B: 'static>(
        &self,
        emitter: &EventHub<B>,
        names: &str,
        callback: &Callback<B>,
    ) -> &Self {
        let context = self.track(emitter);
        emitter.on(names, callback, Some(context));
        self
    }

    /// Tracked form of [`once`](Self::once).
    pub fn listen_to_once<B: 'static>(
        &self,
        emitter: &EventHub<B>,
        names: &str,
        callback: &Callback<B>,
    ) -> &Self {
        let context = self.track(emitter);
        emitter.once(names, callback, Some(context));
        self
    }

    /// Map form of [`listen_to`](Self::listen_to).
    pub fn listen_to_each<'a, B: 'static>(
        &self,
        emitter: &EventHub<B>,
        map: impl IntoIterator<Item = (&'a str, &'a Callback<B>)>,
    ) -> &Self {
        let context = self.track(emitter);
        emitter.on_each(map, Some(context));
        self
    }

    fn track<B: 'static>(&self, emitter: &EventHub<B>) -> ListenId {
        let context = self.listen_id();
        let emitter_id = emitter.listen_id();
        self.inner
            .borrow_mut()
            .listening_to
            .insert(emitter_id, Box::new(TrackedHub(Rc::downgrade(&emitter.inner))));
        context
    }

    /// Retracts subscriptions made through [`listen_to`](Self::listen_to).
    ///
    /// Without an emitter every tracked emitter is considered. An emitter
    /// stops being tracked once none of this hub's registrations remain on
    /// it, or unconditionally when neither a name nor a callback was given.
    pub fn stop_listening(
        &self,
        emitter: Option<&dyn Emitter>,
        name: Option<&str>,
        callback: Option<CallbackId>,
    ) -> &Self {
        let Some(context) = self.inner.borrow().listen_id else {
            return self;
        };
        let full = name.is_none() && callback.is_none();

        let targets: Vec<(ListenId, Box<dyn Tracked>)> = {
            let mut registry = self.inner.borrow_mut();
            match emitter {
                Some(emitter) => emitter
                    .existing_listen_id()
                    .and_then(|id| registry.listening_to.remove(&id).map(|t| (id, t)))
                    .into_iter()
                    .collect(),
                None => std::mem::take(&mut registry.listening_to).into_iter().collect(),
            }
        };

        for (id, tracked) in targets {
            tracked.retract(name, callback, context);
            if !full && tracked.is_tracking(context) {
                self.inner.borrow_mut().listening_to.insert(id, tracked);
            }
        }
        self
    }

    /// Map form of [`stop_listening`](Self::stop_listening).
    pub fn stop_listening_each<'a>(
        &self,
        emitter: Option<&dyn Emitter>,
        map: impl IntoIterator<Item = (&'a str, CallbackId)>,
    ) -> &Self {
        for (names, callback) in map {
            self.stop_listening(emitter, Some(names), Some(callback));
        }
        self
    }

    /// Number of emitters this hub is currently tracking.
    #[must_use]
    pub fn listening_count(&self) -> usize {
        self.inner.borrow().listening_to.len()
    }
}
