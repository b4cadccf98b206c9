//! Reply orchestration for one newly created log entry.
//!
//! An invocation walks `Filtering -> BuildingContext -> Completing ->
//! Persisting` and ends as replied, skipped, or aborted. It keeps no state
//! between invocations, and nothing coordinates concurrent invocations: two
//! quick user entries may be answered from overlapping windows.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::chat::core::config::AgentConfig;
use crate::chat::core::errors::ReplyError;
use crate::chat::core::message::{ChatMessage, NewMessage};
use crate::chat::core::policy::is_reply_trigger;
use crate::chat::prompt::context_window::build_context_window;
use crate::chat::prompt::prompt_builder::assemble_prompt;
use crate::chat::storage::message_store::MessageStore;
use crate::llm::completion_client::CompletionClient;

/// Pipeline step an invocation was in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplyStage {
    /// Deciding whether the entry warrants a reply.
    Filtering,
    /// Reading history and assembling the prompt.
    BuildingContext,
    /// Waiting on the completion service.
    Completing,
    /// Appending the reply.
    Persisting,
}

impl ReplyStage {
    /// Stable string form for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filtering => "filtering",
            Self::BuildingContext => "building_context",
            Self::Completing => "completing",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for ReplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an entry was intentionally left unanswered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The entry carries no value.
    EmptyEntry,
    /// The entry's role is not exactly `"user"`.
    NotUserRole,
    /// No completion credential is configured.
    MissingCredential,
}

/// Terminal state of one invocation.
#[derive(Debug)]
pub enum ReplyOutcome {
    /// Filtered out; nothing was read or written.
    Skipped(SkipReason),
    /// The reply was appended.
    Replied(ChatMessage),
    /// A step failed; nothing was written.
    Aborted {
        /// Step that failed.
        stage: ReplyStage,
        /// Failure cause.
        error: ReplyError,
    },
}

impl ReplyOutcome {
    /// The appended reply, if any.
    #[must_use]
    pub const fn reply(&self) -> Option<&ChatMessage> {
        match self {
            Self::Replied(message) => Some(message),
            Self::Skipped(_) | Self::Aborted { .. } => None,
        }
    }
}

/// Trigger handler turning a new user entry into an assistant reply.
pub struct ReplyOrchestrator {
    store: Arc<dyn MessageStore>,
    completion: Arc<dyn CompletionClient>,
    bot_name: String,
    system_instruction: String,
    credential_configured: bool,
}

impl ReplyOrchestrator {
    /// Create an orchestrator over explicit collaborators.
    #[must_use]
    pub fn new(
        config: &AgentConfig,
        store: Arc<dyn MessageStore>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            store,
            completion,
            bot_name: config.persona.bot_name.clone(),
            system_instruction: config.persona.system_instruction.clone(),
            credential_configured: config.completion.has_credential(),
        }
    }

    /// Handle one newly created entry.
    ///
    /// Never fails: errors are logged and reported as [`ReplyOutcome::Aborted`].
    pub async fn handle(&self, entry: &ChatMessage) -> ReplyOutcome {
        if let Some(reason) = self.filter(entry) {
            match reason {
                SkipReason::MissingCredential => {
                    error!(key = %entry.key, "Completion credential is not configured, skipping reply");
                }
                SkipReason::EmptyEntry | SkipReason::NotUserRole => {
                    info!(key = %entry.key, ?reason, "Not a user message, skipping");
                }
            }
            return ReplyOutcome::Skipped(reason);
        }

        match self.reply(entry).await {
            Ok(reply) => {
                info!(key = %entry.key, reply_key = %reply.key, "Reply appended");
                ReplyOutcome::Replied(reply)
            }
            Err((stage, err)) => {
                error!(key = %entry.key, %stage, error = %err, "Reply aborted");
                ReplyOutcome::Aborted { stage, error: err }
            }
        }
    }

    fn filter(&self, entry: &ChatMessage) -> Option<SkipReason> {
        if entry.is_empty() {
            return Some(SkipReason::EmptyEntry);
        }
        if !is_reply_trigger(entry) {
            return Some(SkipReason::NotUserRole);
        }
        if !self.credential_configured {
            return Some(SkipReason::MissingCredential);
        }
        None
    }

    async fn reply(&self, entry: &ChatMessage) -> Result<ChatMessage, (ReplyStage, ReplyError)> {
        let window = build_context_window(self.store.as_ref())
            .await
            .map_err(|err| (ReplyStage::BuildingContext, ReplyError::StoreRead(err)))?;
        let prompt = assemble_prompt(&self.system_instruction, window);
        debug!(key = %entry.key, entries = prompt.len(), "Prompt assembled");

        let text = self
            .completion
            .complete(&prompt)
            .await
            .map_err(|err| (ReplyStage::Completing, ReplyError::from(err)))?;
        info!(key = %entry.key, reply = %text, "Completion received");

        self.store
            .append_message(NewMessage::assistant(self.bot_name.as_str(), text))
            .await
            .map_err(|err| (ReplyStage::Persisting, ReplyError::StoreWrite(err)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::chat::core::errors::{StoreError, StoreResult};
    use crate::chat::core::ids::MessageKey;
    use crate::chat::core::policy::{FALLBACK_REPLY, MAX_HISTORY};
    use crate::chat::storage::message_store::StoreFuture;
    use crate::chat::storage::sqlite_message_store::SqliteMessageStore;
    use crate::chat::storage::subscription::MessageSubscription;
    use crate::llm::completion_client::{
        CompletionError, CompletionFuture, CompletionResult, OpenAiCompletionClient,
        PromptMessage, PromptRole,
    };

    enum Script {
        Reply(&'static str),
        Status(u16),
        NoCredential,
    }

    struct ScriptedCompletion {
        script: Script,
        prompts: Mutex<Vec<Vec<PromptMessage>>>,
    }

    impl ScriptedCompletion {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<Vec<PromptMessage>> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl CompletionClient for ScriptedCompletion {
        fn complete<'a>(
            &'a self,
            prompt: &'a [PromptMessage],
        ) -> CompletionFuture<'a, CompletionResult<String>> {
            Box::pin(async move {
                self.prompts.lock().unwrap().push(prompt.to_vec());
                match self.script {
                    Script::Reply(text) => Ok(text.to_string()),
                    Script::Status(status) => Err(CompletionError::Service {
                        status,
                        body: "error".to_string(),
                    }),
                    Script::NoCredential => Err(CompletionError::MissingCredential),
                }
            })
        }
    }

    /// Store whose reads or writes fail on demand.
    struct BrokenStore {
        inner: SqliteMessageStore,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl MessageStore for BrokenStore {
        fn append_message(&self, message: NewMessage) -> StoreFuture<'_, StoreResult<ChatMessage>> {
            if self.fail_writes {
                return Box::pin(async {
                    Err(StoreError::InvalidRecord("disk full".to_string()))
                });
            }
            self.inner.append_message(message)
        }

        fn read_last_n(&self, n: usize) -> StoreFuture<'_, StoreResult<Vec<ChatMessage>>> {
            if self.fail_reads {
                return Box::pin(async {
                    Err(StoreError::InvalidRecord("unavailable".to_string()))
                });
            }
            self.inner.read_last_n(n)
        }

        fn subscribe(&self) -> MessageSubscription {
            self.inner.subscribe()
        }
    }

    fn config(api_key: Option<&str>) -> AgentConfig {
        let mut config = AgentConfig::default();
        config.persona.system_instruction = "persona".to_string();
        config.completion.api_key = api_key.map(str::to_string);
        config
    }

    async fn store() -> Arc<SqliteMessageStore> {
        Arc::new(SqliteMessageStore::open_in_memory("chat").await.unwrap())
    }

    async fn log(store: &SqliteMessageStore) -> Vec<ChatMessage> {
        store.read_last_n(1000).await.unwrap()
    }

    #[tokio::test]
    async fn non_user_entries_never_write() {
        let store = store().await;
        let completion = ScriptedCompletion::new(Script::Reply("B"));
        let orchestrator =
            ReplyOrchestrator::new(&config(Some("sk")), store.clone(), completion.clone());

        let assistant = store
            .append_message(NewMessage::assistant("DeepDive Bot", "hi"))
            .await
            .unwrap();
        let odd = store
            .append_message(NewMessage {
                role: Some("moderator".to_string()),
                text: Some("x".to_string()),
                display_name: None,
            })
            .await
            .unwrap();
        let empty = store.append_message(NewMessage::default()).await.unwrap();

        assert!(matches!(
            orchestrator.handle(&assistant).await,
            ReplyOutcome::Skipped(SkipReason::NotUserRole)
        ));
        assert!(matches!(
            orchestrator.handle(&odd).await,
            ReplyOutcome::Skipped(SkipReason::NotUserRole)
        ));
        assert!(matches!(
            orchestrator.handle(&empty).await,
            ReplyOutcome::Skipped(SkipReason::EmptyEntry)
        ));
        assert_eq!(log(&store).await.len(), 3);
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn user_entry_gets_assistant_reply() {
        let store = store().await;
        let completion = ScriptedCompletion::new(Script::Reply("B"));
        let orchestrator =
            ReplyOrchestrator::new(&config(Some("sk")), store.clone(), completion.clone());

        let entry = store.append_message(NewMessage::user("guest", "A")).await.unwrap();
        let outcome = orchestrator.handle(&entry).await;

        let reply = outcome.reply().cloned().unwrap();
        assert_eq!(reply.text.as_deref(), Some("B"));
        assert_eq!(reply.role.as_deref(), Some("assistant"));
        assert_eq!(reply.display_name.as_deref(), Some("DeepDive Bot"));
        assert!(reply.key > entry.key);

        assert_eq!(
            completion.prompts(),
            vec![vec![
                PromptMessage::new(PromptRole::System, "persona"),
                PromptMessage::new(PromptRole::User, "A"),
            ]]
        );
        assert_eq!(log(&store).await, vec![entry, reply]);
    }

    #[tokio::test]
    async fn user_entry_without_text_still_replies() {
        let store = store().await;
        store.append_message(NewMessage::user("guest", "earlier")).await.unwrap();
        let completion = ScriptedCompletion::new(Script::Reply("B"));
        let orchestrator =
            ReplyOrchestrator::new(&config(Some("sk")), store.clone(), completion.clone());

        let silent = store
            .append_message(NewMessage {
                display_name: Some("guest".to_string()),
                text: None,
                role: Some("user".to_string()),
            })
            .await
            .unwrap();

        assert!(orchestrator.handle(&silent).await.reply().is_some());
        assert_eq!(completion.prompts()[0].len(), 2);
    }

    #[tokio::test]
    async fn missing_credential_skips_without_calling_service() {
        let store = store().await;
        let completion = ScriptedCompletion::new(Script::Reply("B"));
        let orchestrator = ReplyOrchestrator::new(&config(None), store.clone(), completion.clone());

        let entry = store.append_message(NewMessage::user("guest", "A")).await.unwrap();
        assert!(matches!(
            orchestrator.handle(&entry).await,
            ReplyOutcome::Skipped(SkipReason::MissingCredential)
        ));
        assert!(completion.prompts().is_empty());
        assert_eq!(log(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn configuration_error_from_client_aborts() {
        let store = store().await;
        let completion = ScriptedCompletion::new(Script::NoCredential);
        let orchestrator = ReplyOrchestrator::new(&config(Some("sk")), store.clone(), completion);

        let entry = store.append_message(NewMessage::user("guest", "A")).await.unwrap();
        match orchestrator.handle(&entry).await {
            ReplyOutcome::Aborted { stage, error } => {
                assert_eq!(stage, ReplyStage::Completing);
                assert!(matches!(error, ReplyError::Configuration(_)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(log(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn service_error_leaves_log_unchanged() {
        let store = store().await;
        let completion = ScriptedCompletion::new(Script::Status(500));
        let orchestrator = ReplyOrchestrator::new(&config(Some("sk")), store.clone(), completion);

        let entry = store.append_message(NewMessage::user("guest", "A")).await.unwrap();
        match orchestrator.handle(&entry).await {
            ReplyOutcome::Aborted { stage, error } => {
                assert_eq!(stage, ReplyStage::Completing);
                assert!(matches!(error, ReplyError::CompletionService { status: 500, .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(log(&store).await, vec![entry]);
    }

    #[tokio::test]
    async fn store_read_failure_aborts_before_completion() {
        let inner = SqliteMessageStore::open_in_memory("chat").await.unwrap();
        let entry = inner.append_message(NewMessage::user("guest", "A")).await.unwrap();
        let store = Arc::new(BrokenStore {
            inner,
            fail_reads: true,
            fail_writes: false,
        });
        let completion = ScriptedCompletion::new(Script::Reply("B"));
        let orchestrator =
            ReplyOrchestrator::new(&config(Some("sk")), store, completion.clone());

        match orchestrator.handle(&entry).await {
            ReplyOutcome::Aborted { stage, error } => {
                assert_eq!(stage, ReplyStage::BuildingContext);
                assert!(matches!(error, ReplyError::StoreRead(_)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn store_write_failure_drops_computed_reply() {
        let inner = SqliteMessageStore::open_in_memory("chat").await.unwrap();
        let entry = inner.append_message(NewMessage::user("guest", "A")).await.unwrap();
        let store = Arc::new(BrokenStore {
            inner,
            fail_reads: false,
            fail_writes: true,
        });
        let completion = ScriptedCompletion::new(Script::Reply("B"));
        let orchestrator =
            ReplyOrchestrator::new(&config(Some("sk")), store.clone(), completion.clone());

        match orchestrator.handle(&entry).await {
            ReplyOutcome::Aborted { stage, error } => {
                assert_eq!(stage, ReplyStage::Persisting);
                assert!(matches!(error, ReplyError::StoreWrite(_)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(completion.prompts().len(), 1);
        assert_eq!(store.inner.read_last_n(10).await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn twelfth_entry_prompt_holds_ten_history_entries() {
        let store = store().await;
        for i in 1..=11 {
            let draft = if i % 2 == 1 {
                NewMessage::user("guest", format!("m{i}"))
            } else {
                NewMessage::assistant("DeepDive Bot", format!("m{i}"))
            };
            store.append_message(draft).await.unwrap();
        }
        let completion = ScriptedCompletion::new(Script::Reply("ok"));
        let orchestrator =
            ReplyOrchestrator::new(&config(Some("sk")), store.clone(), completion.clone());

        let twelfth = store.append_message(NewMessage::user("guest", "m12")).await.unwrap();
        assert!(orchestrator.handle(&twelfth).await.reply().is_some());

        let prompt = completion.prompts().remove(0);
        assert_eq!(prompt.len(), MAX_HISTORY + 1);
        assert_eq!(prompt[0], PromptMessage::new(PromptRole::System, "persona"));
        let contents: Vec<&str> = prompt[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["m3", "m4", "m5", "m6", "m7", "m8", "m9", "m10", "m11", "m12"]
        );
        assert_eq!(prompt[1].role, PromptRole::User);
        assert_eq!(prompt[2].role, PromptRole::Assistant);
    }

    #[tokio::test]
    async fn concurrent_invocations_both_reply() {
        let store = store().await;
        let completion = ScriptedCompletion::new(Script::Reply("ok"));
        let orchestrator =
            ReplyOrchestrator::new(&config(Some("sk")), store.clone(), completion.clone());

        let first = store.append_message(NewMessage::user("a", "one")).await.unwrap();
        let second = store.append_message(NewMessage::user("b", "two")).await.unwrap();
        let (left, right) = tokio::join!(orchestrator.handle(&first), orchestrator.handle(&second));

        assert!(left.reply().is_some());
        assert!(right.reply().is_some());
        let entries = log(&store).await;
        assert_eq!(entries.len(), 4);
        assert!(entries.windows(2).all(|pair| pair[0].key < pair[1].key));
    }

    #[tokio::test]
    async fn end_to_end_with_http_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "B"}}]
            })))
            .mount(&server)
            .await;

        let mut config = config(Some("sk-test"));
        config.completion.endpoint = format!("{}/v1/chat/completions", server.uri());
        let store = store().await;
        let client = Arc::new(OpenAiCompletionClient::new(&config.completion).unwrap());
        let orchestrator = ReplyOrchestrator::new(&config, store.clone(), client);

        let entry = store.append_message(NewMessage::user("guest", "A")).await.unwrap();
        orchestrator.handle(&entry).await;

        let entries = log(&store).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry);
        assert_eq!(entries[1].role.as_deref(), Some("assistant"));
        assert_eq!(entries[1].text.as_deref(), Some("B"));
        assert_eq!(entries[1].display_name.as_deref(), Some("DeepDive Bot"));
    }

    #[tokio::test]
    async fn malformed_success_persists_fallback_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .mount(&server)
            .await;

        let mut config = config(Some("sk-test"));
        config.completion.endpoint = server.uri();
        let store = store().await;
        let client = Arc::new(OpenAiCompletionClient::new(&config.completion).unwrap());
        let orchestrator = ReplyOrchestrator::new(&config, store.clone(), client);

        let entry = store.append_message(NewMessage::user("guest", "A")).await.unwrap();
        let reply = orchestrator.handle(&entry).await.reply().cloned().unwrap();
        assert_eq!(reply.text.as_deref(), Some(FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn http_500_end_to_end_leaves_single_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let mut config = config(Some("sk-test"));
        config.completion.endpoint = server.uri();
        let store = store().await;
        let client = Arc::new(OpenAiCompletionClient::new(&config.completion).unwrap());
        let orchestrator = ReplyOrchestrator::new(&config, store.clone(), client);

        let entry = store.append_message(NewMessage::user("guest", "A")).await.unwrap();
        orchestrator.handle(&entry).await;
        assert_eq!(log(&store).await.len(), 1);
    }

    #[test]
    fn outcome_reply_accessor() {
        let message = ChatMessage {
            key: MessageKey::new(1),
            display_name: None,
            text: None,
            role: None,
            created_at: Utc::now(),
        };
        assert!(ReplyOutcome::Replied(message).reply().is_some());
        assert!(ReplyOutcome::Skipped(SkipReason::EmptyEntry).reply().is_none());
        assert_eq!(ReplyStage::BuildingContext.to_string(), "building_context");
    }
}
