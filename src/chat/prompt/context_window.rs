//! Context window: the trailing slice of the log sent as conversational memory.

use crate::chat::core::errors::StoreResult;
use crate::chat::core::message::{ChatMessage, MessageRole};
use crate::chat::core::policy::{context_role, MAX_HISTORY};
use crate::chat::storage::message_store::MessageStore;
use crate::llm::completion_client::{PromptMessage, PromptRole};

/// Read the last [`MAX_HISTORY`] entries and convert them to prompt entries.
///
/// The entry that triggered the invocation is already persisted, so it is
/// part of the window.
///
/// # Errors
/// Returns an error if the store read fails.
pub async fn build_context_window(store: &dyn MessageStore) -> StoreResult<Vec<PromptMessage>> {
    let entries = store.read_last_n(MAX_HISTORY).await?;
    Ok(window_from_entries(&entries))
}

/// Convert stored entries (oldest first) into role/content pairs.
///
/// Entries without text are dropped; roles are normalized by [`context_role`].
#[must_use]
pub fn window_from_entries(entries: &[ChatMessage]) -> Vec<PromptMessage> {
    entries
        .iter()
        .filter_map(|entry| {
            let text = entry.non_empty_text()?;
            let role = match context_role(entry.role_str()) {
                MessageRole::Assistant => PromptRole::Assistant,
                MessageRole::User => PromptRole::User,
            };
            Some(PromptMessage::new(role, text))
        })
        .collect()
}
