//! Speech endpoints.
//!
//! - `POST /tts` `{text, voice?}` returns synthesized audio bytes
//! - `POST /stt` multipart with an `audio` file field returns `{text}`

use axum::{
    Router,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::SharedState;
use crate::error::ApiError;

/// Filename used when the upload does not name one.
const DEFAULT_UPLOAD_NAME: &str = "audio.webm";

pub fn speech_router(state: SharedState) -> Router {
    Router::new()
        .route("/tts", post(tts_handler))
        .route("/stt", post(stt_handler))
        .with_state(state)
}

#[derive(Deserialize)]
struct TtsRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    voice: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SttResponse {
    text: String,
}

async fn tts_handler(
    State(state): State<SharedState>,
    Json(payload): Json<TtsRequest>,
) -> Result<Response, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }

    let audio = state
        .tts
        .synthesize(&payload.text, payload.voice.as_deref())
        .await?;
    info!(chars = payload.text.len(), bytes = audio.len(), "TTS response");

    Ok(([(header::CONTENT_TYPE, state.tts.content_type())], audio).into_response())
}

async fn stt_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<SttResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("audio") {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read audio: {e}")))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::bad_request("missing 'audio' file field"));
    };
    if bytes.is_empty() {
        return Err(ApiError::bad_request("audio file is empty"));
    }

    let size = bytes.len();
    let text = state.stt.transcribe(bytes.to_vec(), &filename).await?;
    info!(bytes = size, chars = text.len(), "STT response");

    Ok(Json(SttResponse { text }))
}
