//! LLM-facing components.

pub mod completion_client;

pub use completion_client::{
    CompletionClient, CompletionError, CompletionFuture, CompletionResult, OpenAiCompletionClient,
    PromptMessage, PromptRole,
};
