//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::storage::message_store::MessageStore;

/// Shared application state.
pub struct AppState {
    /// The shared conversation log.
    pub store: Arc<dyn MessageStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}
