//! Chat completion client for an `OpenAI`-compatible endpoint.
//!
//! Behaviour:
//! - One `POST` per call carrying `{model, messages}`; no retries.
//! - Non-success status: the raw error body is returned to the caller.
//! - Success without `choices[0].message.content`: the fixed fallback reply.
//! - No credential: fails before any network I/O.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::chat::core::config::CompletionConfig;
use crate::chat::core::policy::reply_or_fallback;

/// Boxed future type for completion calls.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced by the completion client.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No credential configured.
    #[error("completion credential is not configured")]
    MissingCredential,
    /// The service answered with a non-success status.
    #[error("completion service returned {status}: {body}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Raw error body.
        body: String,
    },
    /// HTTP transport error.
    #[error("http client error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The success body was not JSON.
    #[error("undecodable completion body: {0}")]
    Decode(#[from] serde_json::Error),
    /// The configured endpoint is not a URL.
    #[error("invalid completion endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Convenience result alias for completion calls.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// Role of a prompt entry on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    /// Fixed instruction.
    System,
    /// Participant utterance.
    User,
    /// Earlier agent reply.
    Assistant,
}

impl PromptRole {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One role-tagged prompt entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Speaker role.
    pub role: PromptRole,
    /// Utterance text.
    pub content: String,
}

impl PromptMessage {
    /// Build a prompt entry.
    #[must_use]
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Stateless request/response completion service.
pub trait CompletionClient: Send + Sync {
    /// Generate a reply for the prompt.
    ///
    /// # Errors
    /// Returns an error if no credential is configured, the transport fails,
    /// the service answers with a non-success status, or the body is not JSON.
    fn complete<'a>(
        &'a self,
        prompt: &'a [PromptMessage],
    ) -> CompletionFuture<'a, CompletionResult<String>>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
}

/// Async client for `/v1/chat/completions`.
pub struct OpenAiCompletionClient {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompletionClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not a URL or the HTTP client cannot be built.
    pub fn new(config: &CompletionConfig) -> CompletionResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: Url::parse(&config.endpoint)?,
            model: config.model.clone(),
            api_key: config.credential().map(str::to_string),
        })
    }
}

impl CompletionClient for OpenAiCompletionClient {
    fn complete<'a>(
        &'a self,
        prompt: &'a [PromptMessage],
    ) -> CompletionFuture<'a, CompletionResult<String>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or(CompletionError::MissingCredential)?;

            let request = ChatCompletionRequest {
                model: &self.model,
                messages: prompt,
            };
            debug!(model = %self.model, messages = ?prompt, "Sending prompt to completion service");

            let response = self
                .client
                .post(self.endpoint.clone())
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_else(|err| {
                    warn!(
                        status = status.as_u16(),
                        error = %err,
                        "Failed to read error body from completion service"
                    );
                    String::new()
                });
                return Err(CompletionError::Service {
                    status: status.as_u16(),
                    body,
                });
            }

            let body = response.text().await?;
            let value: Value = serde_json::from_str(&body)?;
            Ok(extract_reply(&value))
        })
    }
}

/// Pull `choices[0].message.content` out of a success body.
fn extract_reply(body: &Value) -> String {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str);
    if content.is_none_or(str::is_empty) {
        warn!("Completion body has no reply content, using fallback reply");
    }
    reply_or_fallback(content)
}
