//! Named-event publish/subscribe for Strata.
//!
//! [`EventHub`] is the capability both entities and collections compose:
//! - `on` / `once` / `off` register and remove [`Callback`]s by event name
//! - `trigger` dispatches synchronously, in registration order
//! - `listen_to` / `stop_listening` track subscriptions made on *other*
//!   hubs so they can be retracted in bulk
//!
//! Event names may be space separated (`"add remove"`); each token is
//! handled independently. Callbacks registered under [`ALL`] receive every
//! event. Every callback is handed the real event name alongside the
//! payload.
//!
//! # Dispatch invariants
//!
//! 1. Dispatch iterates a snapshot of the handler list taken when the
//!    trigger starts. Handlers added during dispatch run from the next
//!    trigger on.
//! 2. Handlers removed during dispatch that have not yet run are skipped.
//! 3. Nested triggers run to completion before the outer one resumes.

mod callback;
mod hub;

pub use callback::Callback;
pub use hub::{ALL, Emitter, EventHub};
pub use strata_types::{CallbackId, Error, ListenId, Result};
