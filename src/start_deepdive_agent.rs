//! Startup helpers for the `DeepDive` reply agent.
//!
//! Wires the message store, completion client, reply dispatcher and the
//! participant API together, then runs until Ctrl+C.

use std::process::ExitCode;
use std::sync::Arc;

use crate::chat::core::config::AgentConfig;
use crate::chat::engine::{ReplyDispatcher, ReplyOrchestrator};
use crate::chat::storage::{MessageStore, SqliteMessageStore};
use crate::llm::OpenAiCompletionClient;
use crate::server::{self, AppState};

/// Run the agent (used by the `deepdive-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting DeepDive agent v{}", env!("CARGO_PKG_VERSION"));

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(config)) {
        tracing::error!("Agent error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Run the reply dispatcher and the HTTP API until Ctrl+C.
///
/// # Errors
/// Returns an error if the store or client cannot be initialized, or the server fails.
pub async fn serve(config: AgentConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !config.completion.has_credential() {
        tracing::error!("OPENAI_API_KEY is not set; every message will be skipped");
    }
    tracing::info!(
        db = %config.storage.sqlite_path.display(),
        model = %config.completion.model,
        "Opening conversation log"
    );

    let sqlite = Arc::new(SqliteMessageStore::new(&config.storage).await?);
    let store: Arc<dyn MessageStore> = sqlite;
    let completion = Arc::new(OpenAiCompletionClient::new(&config.completion)?);
    let orchestrator = Arc::new(ReplyOrchestrator::new(&config, Arc::clone(&store), completion));

    let dispatcher = ReplyDispatcher::new(orchestrator, store.subscribe());
    let stop = dispatcher.shutdown_notifier();
    let worker = dispatcher.spawn();

    server::run_server_with_shutdown(AppState::new(store), config.server.port, shutdown_signal())
        .await?;

    stop.notify_one();
    let stats = worker.await?;
    tracing::info!(
        received = stats.received,
        replied = stats.replied,
        skipped = stats.skipped,
        aborted = stats.aborted,
        "DeepDive agent stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
    }
}
