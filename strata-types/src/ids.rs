//! Identifier types used throughout Strata.
//!
//! All identifiers draw from one process-wide monotonically increasing
//! counter, so a client id, a listen id and a callback id are never equal
//! to one another. The counter is never reset.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

fn next_uid() -> u64 {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

/// Locally generated identity of an entity.
///
/// Assigned at construction and stable for the entity's lifetime. Used for
/// lookups before a domain id exists. Displays as `c<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocates the next client id.
    #[must_use]
    pub fn next() -> Self {
        Self(next_uid())
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parses the `c<n>` display form.
    pub fn parse(s: &str) -> Option<Self> {
        s.strip_prefix('c')?.parse().ok().map(Self)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Identity of an event hub in a listen relationship.
///
/// Emitters receive one lazily, on their first subscription through
/// `listen_to`. Subscribers use their own as the registration context.
/// Displays as `l<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenId(u64);

impl ListenId {
    /// Allocates the next listen id.
    #[must_use]
    pub fn next() -> Self {
        Self(next_uid())
    }
}

impl fmt::Display for ListenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

impl FromStr for ListenId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('l').parse().map(Self)
    }
}

/// Identity of a registered callback, shared by all clones of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    /// Allocates the next callback id.
    #[must_use]
    pub fn next() -> Self {
        Self(next_uid())
    }
}
