//! Error types for the reply pipeline.

use thiserror::Error;

use crate::llm::completion_client::CompletionError;

/// Message store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// A stored row could not be mapped back to a message.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Convenience result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error while reading a configuration file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure of a single reply invocation.
///
/// Nothing here reaches the message author; the orchestrator logs it and the
/// only visible symptom is a missing reply.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// No completion credential is configured.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Reading the history window failed.
    #[error("store read failed: {0}")]
    StoreRead(#[source] StoreError),
    /// Appending the reply failed; the computed reply is lost.
    #[error("store write failed: {0}")]
    StoreWrite(#[source] StoreError),
    /// The completion service answered with a non-success status.
    #[error("completion service returned {status}: {body}")]
    CompletionService {
        /// HTTP status code.
        status: u16,
        /// Raw error body.
        body: String,
    },
    /// The completion call failed before a status was available, or its body was unreadable.
    #[error("completion failed: {0}")]
    Completion(#[source] CompletionError),
}

impl From<CompletionError> for ReplyError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::MissingCredential => {
                Self::Configuration("completion credential is not configured".to_string())
            }
            CompletionError::Service { status, body } => Self::CompletionService { status, body },
            other => Self::Completion(other),
        }
    }
}
