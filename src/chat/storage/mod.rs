//! Storage for the shared conversation log.

pub mod message_store;
pub mod sqlite_message_store;
pub mod subscription;

pub use message_store::{MessageStore, StoreFuture};
pub use sqlite_message_store::SqliteMessageStore;
pub use subscription::{MessageSubscription, SubscriberSet};
