//! Message model for the shared conversation log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::MessageKey;

/// Role of a conversation participant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Human participant.
    User,
    /// Reply written by the agent.
    Assistant,
}

impl MessageRole {
    /// Stable string form for storage and the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored log entry, exactly as persisted.
///
/// Fields written by participants are optional: other writers share the log
/// and may leave any of them out. Consumers apply
/// [`crate::chat::core::policy`] instead of trusting the raw values.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Store-assigned key.
    pub key: MessageKey,
    /// Display-only author name.
    #[serde(default, alias = "uname", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-form message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Raw role string; only `"user"` and `"assistant"` carry meaning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Store-assigned creation time. Write-only metadata, never used for ordering.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Raw role as stored.
    #[must_use]
    pub fn role_str(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Body text if present and non-empty.
    #[must_use]
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }

    /// Whether the entry carries no participant-written value at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.text.is_none() && self.role.is_none()
    }
}

/// An entry about to be appended; the store assigns key and timestamp.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Display-only author name.
    #[serde(default, alias = "uname")]
    pub display_name: Option<String>,
    /// Message body.
    #[serde(default)]
    pub text: Option<String>,
    /// Raw role string.
    #[serde(default)]
    pub role: Option<String>,
}

impl NewMessage {
    /// Build a participant entry.
    #[must_use]
    pub fn user(display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            text: Some(text.into()),
            role: Some(MessageRole::User.as_str().to_string()),
        }
    }

    /// Build an agent reply entry.
    #[must_use]
    pub fn assistant(bot_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            display_name: Some(bot_name.into()),
            text: Some(text.into()),
            role: Some(MessageRole::Assistant.as_str().to_string()),
        }
    }
}
