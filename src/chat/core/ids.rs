// File: src/chat/core/ids.rs

//! Identifier types for the conversation log.
//!
//! Two kinds of identity exist:
//! - [`MessageKey`]: the store-assigned key of a log entry. Keys are
//!   monotonically increasing and define the total order of the log.
//! - [`InvocationId`]: a random identifier attached to one trigger
//!   invocation, used only to correlate log lines.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned key of a single log entry.
///
/// Ordering of keys is authoritative for the conversation; timestamps are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MessageKey(pub i64);

impl MessageKey {
    /// Wrap a raw row key.
    #[inline]
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one reply invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct InvocationId(pub Uuid);

impl Default for InvocationId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationId {
    /// Create a new random identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
