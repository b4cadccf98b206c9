//! Configuration for the reply agent.
//!
//! Built once at startup and handed to the components explicitly; nothing in
//! the pipeline reads ambient globals.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ConfigError, ConfigResult};

/// Default coaching persona with its required three-section output format.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r"
あなたは「DeepDive」という名前のコーチングAIです。
日本語で会話しながら、ユーザーのキャリアや仕事のモヤモヤを整理し、
本音・価値観・選択肢を一緒に言語化します。

出力フォーマットは必ず次の3ブロックにしてください：

【事実】
- ユーザーの発言から、事実ベースで言えることを箇条書きで整理する

【仮説】
- 事実から推測される可能性を箇条書きで整理する
- 推測であることを前提に、言い切りすぎない表現にする

【問い】
- ユーザーが自分で考えを深められるような質問を1〜2個だけ投げかける
- 質問は具体的にしすぎず、「考える余白」を残す

トーンは落ち着いてフラットに。
相手を評価したり決めつけたりせず、「一緒に考える相棒」として振る舞ってください。
";

/// Default display name of reply entries.
pub const DEFAULT_BOT_NAME: &str = "DeepDive Bot";

/// Default chat completions endpoint.
pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default HTTP port of the participant API.
pub const DEFAULT_PORT: u16 = 3000;

/// Top-level agent configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Message log storage.
    pub storage: StorageConfig,
    /// Completion service access.
    pub completion: CompletionConfig,
    /// Agent persona.
    pub persona: PersonaConfig,
    /// Participant HTTP API.
    pub server: ServerConfig,
}

impl AgentConfig {
    /// Load defaults overlaid with process environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed, the system prompt file
    /// cannot be read, or the result fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load defaults overlaid with values from `lookup`.
    ///
    /// # Errors
    /// Same as [`AgentConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("DEEPDIVE_DB_PATH") {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(table) = lookup("DEEPDIVE_TABLE") {
            config.storage.table = table;
        }
        if let Some(endpoint) = lookup("DEEPDIVE_COMPLETION_URL") {
            config.completion.endpoint = endpoint;
        }
        if let Some(model) = lookup("DEEPDIVE_MODEL") {
            config.completion.model = model;
        }
        config.completion.api_key = lookup("OPENAI_API_KEY");
        if let Some(secs) = lookup("DEEPDIVE_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|err| {
                ConfigError::Invalid(format!("DEEPDIVE_TIMEOUT_SECS: {err}"))
            })?;
            config.completion.request_timeout_secs = Some(secs);
        }
        if let Some(name) = lookup("DEEPDIVE_BOT_NAME") {
            config.persona.bot_name = name;
        }
        if let Some(path) = lookup("DEEPDIVE_SYSTEM_PROMPT_FILE") {
            config.persona.system_instruction = std::fs::read_to_string(path)?;
        }
        if let Some(port) = lookup("DEEPDIVE_PORT") {
            config.server.port = port
                .trim()
                .parse()
                .map_err(|err| ConfigError::Invalid(format!("DEEPDIVE_PORT: {err}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// A missing credential is not a validation failure: the agent still runs
    /// and every invocation is skipped.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        if !is_plain_identifier(&self.storage.table) {
            return Err(ConfigError::Invalid(format!(
                "storage.table must be a plain identifier, got {:?}",
                self.storage.table
            )));
        }

        Url::parse(&self.completion.endpoint)?;

        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "completion.model must not be empty".to_string(),
            ));
        }

        if self.completion.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "completion.request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.persona.system_instruction.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "persona.system_instruction must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Storage configuration for the message log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Log table name.
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chat.sqlite"),
            table: "chat".to_string(),
        }
    }
}

/// Completion service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Chat completions endpoint.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Bearer credential. Absent or blank disables reply generation.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Optional per-request timeout; unset leaves the host deadline as the only bound.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl CompletionConfig {
    /// The credential, if one is configured and non-blank.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// Whether a usable credential is configured.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            request_timeout_secs: None,
        }
    }
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Persona of the agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Display name written on reply entries.
    pub bot_name: String,
    /// System instruction prepended to every prompt.
    pub system_instruction: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            bot_name: DEFAULT_BOT_NAME.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// Participant HTTP API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}
