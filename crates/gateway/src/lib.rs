//! HTTP gateway for SchoolPilot.
//!
//! Exposes the web-client chat endpoint (`/__ai__`), the v1 chat and
//! session API, speech synthesis and transcription, the Messenger webhook,
//! and a health check.
//!
//! Built on Axum.

pub mod api_v1;
pub mod error;
pub mod speech;
pub mod webhook;

#[cfg(test)]
mod test_support;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderValue, Method, header},
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use schoolpilot_agent::Advisor;
use schoolpilot_channels::MessengerChannel;
use schoolpilot_config::{AppConfig, GatewayConfig};
use schoolpilot_core::Error;
use schoolpilot_core::channel::Channel;
use schoolpilot_core::session::SessionId;
use schoolpilot_core::speech::{SpeechToText, TextToSpeech};

use crate::error::ApiError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub advisor: Arc<Advisor>,
    pub tts: Arc<dyn TextToSpeech>,
    pub stt: Arc<dyn SpeechToText>,
    /// Present only when the Messenger channel is enabled.
    pub messenger: Option<Arc<MessengerChannel>>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with every route and no cross-cutting layers.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/__ai__", get(ai_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state.clone()))
        .merge(speech::speech_router(state.clone()))
        .merge(webhook::webhook_router(state))
}

/// Build the full router: all routes plus
/// - CORS for the configured web-client origins
/// - request body size limit
/// - HTTP trace logging
pub fn build_full_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    build_router(state)
        .layer(DefaultBodyLimit::max(gateway.max_body_bytes))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build the gateway state from configuration: provider, speech client,
/// advisor (corpus + session store) and, when enabled, the Messenger channel.
pub fn build_state(config: &AppConfig) -> schoolpilot_core::Result<SharedState> {
    let provider = schoolpilot_providers::provider_from_config(config)?;
    let speech = schoolpilot_providers::speech_from_config(config)?;
    let advisor = Advisor::from_config(config, provider).map_err(|e| Error::Config {
        message: e.to_string(),
    })?;

    let messenger = if config.messenger.enabled {
        info!(graph_api_url = %config.messenger.graph_api_url, "Messenger channel enabled");
        Some(Arc::new(MessengerChannel::new(config.messenger.clone())))
    } else {
        None
    };

    Ok(Arc::new(GatewayState {
        advisor: Arc::new(advisor),
        tts: speech.clone(),
        stt: speech,
        messenger,
    }))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = build_state(&config)?;
    check_upstream(&state).await;
    let app = build_full_router(state, &config.gateway);

    info!(addr = %addr, model = %config.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Probe the upstream API once at startup. Failure is logged, not fatal.
async fn check_upstream(state: &GatewayState) {
    let provider = state.advisor.provider();
    match provider.health_check().await {
        Ok(true) => info!(provider = provider.name(), "Upstream API reachable"),
        Ok(false) => warn!(
            provider = provider.name(),
            "Upstream API rejected the health probe; check the API key"
        ),
        Err(e) => warn!(provider = provider.name(), error = %e, "Upstream API unreachable"),
    }
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    sessions: usize,
    /// `None` when the Messenger channel is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    messenger: Option<bool>,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let messenger = match &state.messenger {
        Some(channel) => Some(channel.health_check().await.unwrap_or(false)),
        None => None,
    };

    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions: state.advisor.sessions().len().await,
        messenger,
    })
}

#[derive(Deserialize)]
struct AiQuery {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    session: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct AiResponse {
    output: String,
}

/// `GET /__ai__?prompt=...&session=...` for the web client.
///
/// With a session the prompt is answered in that session's context and the
/// exchange recorded; without one it is answered statelessly.
async fn ai_handler(
    State(state): State<SharedState>,
    Query(query): Query<AiQuery>,
) -> Result<Json<AiResponse>, ApiError> {
    let prompt = query.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(ApiError::bad_request("missing 'prompt' query parameter"));
    }

    let output = match query.session.as_deref().map(str::trim) {
        Some(session) if !session.is_empty() => {
            state
                .advisor
                .respond(&SessionId::from(session), &prompt)
                .await?
        }
        _ => state.advisor.respond_once(&prompt).await?,
    };

    Ok(Json(AiResponse { output }))
}
