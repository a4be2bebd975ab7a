//! Core type definitions for Strata.
//!
//! This crate defines the small, dependency-light types shared by the
//! event hub and the entity model:
//! - Process-unique identifiers for entities, listeners and callbacks
//! - The attribute bag type and helpers for comparing and keying values
//! - The crate-wide error type
//!
//! Nothing here knows about events or entities; those live in
//! `strata-events` and `strata-model`.

mod ids;
mod value;

pub use ids::{CallbackId, ClientId, ListenId};
pub use value::{Attributes, compare_values, id_key, is_present};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur across Strata.
///
/// Validation rejections and lookup misses are not errors; they are
/// reported through return values and events.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A resource location was required but none could be resolved.
    #[error("a url or url root must be specified")]
    MissingUrl,

    /// Persistence was requested for a kind with no sync backend.
    #[error("no sync backend configured for `{0}`")]
    MissingBackend(String),

    /// `sort` was called on a collection without a comparator.
    #[error("collection has no comparator")]
    NoComparator,

    /// A handler registered by method name had no definition at dispatch.
    #[error("event handler `{0}` is not callable")]
    UnresolvedHandler(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
