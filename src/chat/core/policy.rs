//! Defaulting rules shared by the reply pipeline.
//!
//! Every lenient interpretation of log entries lives here so each rule is
//! defined and tested once.

use crate::chat::core::message::{ChatMessage, MessageRole};

/// Number of trailing log entries used as conversational memory.
pub const MAX_HISTORY: usize = 10;

/// Reply persisted when the completion service succeeds without usable content.
pub const FALLBACK_REPLY: &str = "うまく返答を生成できませんでした。もう一度試してもらえますか？";

/// Role an entry plays inside the context window.
///
/// Only an exact `"assistant"` stays assistant; anything else, including a
/// missing role, is treated as a participant utterance.
#[must_use]
pub fn context_role(raw: Option<&str>) -> MessageRole {
    match raw {
        Some("assistant") => MessageRole::Assistant,
        _ => MessageRole::User,
    }
}

/// Whether an entry may trigger a reply: its role must be exactly `"user"`.
#[must_use]
pub fn is_reply_trigger(entry: &ChatMessage) -> bool {
    !entry.is_empty() && entry.role_str() == Some(MessageRole::User.as_str())
}

/// Pick the completion content or fall back to [`FALLBACK_REPLY`].
#[must_use]
pub fn reply_or_fallback(content: Option<&str>) -> String {
    content
        .filter(|text| !text.is_empty())
        .unwrap_or(FALLBACK_REPLY)
        .to_string()
}
