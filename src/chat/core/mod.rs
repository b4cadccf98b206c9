//! Core types: configuration, errors, identifiers, messages, and policy.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod policy;

pub use config::{
    AgentConfig, CompletionConfig, PersonaConfig, ServerConfig, StorageConfig,
    DEFAULT_SYSTEM_INSTRUCTION,
};
pub use errors::{ConfigError, ConfigResult, ReplyError, StoreError, StoreResult};
pub use ids::{InvocationId, MessageKey};
pub use message::{ChatMessage, MessageRole, NewMessage};
pub use policy::{context_role, is_reply_trigger, reply_or_fallback, FALLBACK_REPLY, MAX_HISTORY};
