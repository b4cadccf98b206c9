//! Reply pipeline for the shared conversation log.
//!
//! - `core`: Configuration, errors, identifiers, messages, and defaulting policy
//! - `storage`: The append-only message log and its new-entry subscriptions
//! - `prompt`: Context window and prompt assembly
//! - `engine`: The reply orchestrator and the dispatcher that triggers it

pub mod core;
pub mod engine;
pub mod prompt;
pub mod storage;

pub use self::core::{
    AgentConfig, ChatMessage, CompletionConfig, ConfigError, ConfigResult, InvocationId,
    MessageKey, MessageRole, NewMessage, PersonaConfig, ReplyError, ServerConfig,
    StorageConfig, StoreError, StoreResult, FALLBACK_REPLY, MAX_HISTORY,
};
pub use engine::{DispatchStats, ReplyDispatcher, ReplyOrchestrator, ReplyOutcome, ReplyStage, SkipReason};
pub use prompt::{assemble_prompt, build_context_window, window_from_entries};
pub use storage::{MessageStore, MessageSubscription, SqliteMessageStore, StoreFuture, SubscriberSet};
