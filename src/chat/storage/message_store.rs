//! Message store trait for the shared conversation log.

use std::future::Future;
use std::pin::Pin;

use crate::chat::core::errors::StoreResult;
use crate::chat::core::message::{ChatMessage, NewMessage};
use crate::chat::storage::subscription::MessageSubscription;

/// Boxed future type for message store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Append-only, key-ordered conversation log.
///
/// Implementations never mutate or delete an entry once appended.
pub trait MessageStore: Send + Sync {
    /// Append an entry; the store assigns its key and creation time.
    ///
    /// The append is atomic: either the full entry becomes visible or nothing does.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn append_message(&self, message: NewMessage) -> StoreFuture<'_, StoreResult<ChatMessage>>;

    /// Load up to `n` most recent entries in ascending key order, exactly as stored.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn read_last_n(&self, n: usize) -> StoreFuture<'_, StoreResult<Vec<ChatMessage>>>;

    /// Register for entries appended from now on.
    ///
    /// Each appended entry is delivered once to every live subscription,
    /// after it is persisted. No ordering is promised between entries written
    /// concurrently.
    fn subscribe(&self) -> MessageSubscription;
}
