//! HTTP API v1: chat with session history.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`           : send a message, get a response
//! - `POST   /v1/chat/stream`    : send a message, get an SSE stream
//! - `GET    /v1/sessions/{id}`  : session history
//! - `DELETE /v1/sessions/{id}`  : reset a session

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use schoolpilot_core::session::SessionId;

use crate::SharedState;
use crate::error::ApiError;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(reset_session_handler),
        )
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    /// Existing session to continue; a new one is minted when absent.
    #[serde(default)]
    session_id: Option<String>,
    message: String,
}

impl ChatRequest {
    fn session_id(&self) -> SessionId {
        match self.session_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => SessionId::from(id),
            _ => SessionId::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    session_id: String,
    response: String,
}

#[derive(Serialize, Deserialize)]
struct SessionResponse {
    session_id: String,
    turns: Vec<TurnDto>,
}

#[derive(Serialize, Deserialize)]
struct TurnDto {
    role: String,
    content: String,
    timestamp: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = payload.session_id();
    info!(session = %session_id, message_len = payload.message.len(), "v1/chat request");

    let response = state.advisor.respond(&session_id, &payload.message).await?;

    Ok(Json(ChatResponse {
        session_id: session_id.0,
        response,
    }))
}

async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let session_id = payload.session_id();
    info!(session = %session_id, "v1/chat/stream SSE request");

    let rx = state
        .advisor
        .respond_stream(&session_id, &payload.message)
        .await?;

    let stream = ReceiverStream::new(rx).map(|event| {
        let event_type = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event_type).data(data))
    });

    Ok(Sse::new(stream))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .advisor
        .history(&SessionId::from(&id))
        .await
        .ok_or_else(|| ApiError::not_found(format!("unknown session: {id}")))?;

    Ok(Json(SessionResponse {
        session_id: session.id.0,
        turns: session
            .turns
            .iter()
            .map(|m| TurnDto {
                role: m.role.to_string(),
                content: m.content.clone(),
                timestamp: m.timestamp.to_rfc3339(),
            })
            .collect(),
    }))
}

async fn reset_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> StatusCode {
    state.advisor.reset(&SessionId::from(&id)).await;
    StatusCode::NO_CONTENT
}
