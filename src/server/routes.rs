//! HTTP route handlers for the participant API.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::chat::core::message::{ChatMessage, MessageRole, NewMessage};

use super::state::AppState;

/// Entries returned when no limit is given.
pub const DEFAULT_LIST_LIMIT: usize = 50;
/// Upper bound on entries returned by one listing.
pub const MAX_LIST_LIMIT: usize = 500;

/// Create the API router with all routes.
#[must_use]
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/messages", get(list_messages).post(post_message))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "deepdive-agent",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Message listing query.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of trailing entries.
    pub limit: Option<usize>,
}

/// Participant message submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    /// Display name of the author.
    #[serde(default, alias = "uname")]
    pub display_name: Option<String>,
    /// Message body.
    pub text: String,
    /// Role; defaults to `"user"`.
    #[serde(default)]
    pub role: Option<String>,
}

/// List the most recent entries, oldest first.
async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ChatMessage>>, (StatusCode, String)> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    let messages = state
        .store
        .read_last_n(limit)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Store error: {e}")))?;

    Ok(Json(messages))
}

/// Append a participant entry; the reply arrives asynchronously.
async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), (StatusCode, String)> {
    let draft = NewMessage {
        display_name: request.display_name,
        text: Some(request.text),
        role: Some(
            request
                .role
                .unwrap_or_else(|| MessageRole::User.as_str().to_string()),
        ),
    };

    let stored = state
        .store
        .append_message(draft)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Store error: {e}")))?;

    Ok((StatusCode::CREATED, Json(stored)))
}
