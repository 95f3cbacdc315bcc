//! JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use schoolpilot_core::error::ProviderError;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// An error rendered as `{ "error": ..., "hint": ... }` with a status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                hint: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.body.hint = Some(hint.into());
        self
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        let status =
            StatusCode::from_u16(e.status_hint()).unwrap_or(StatusCode::BAD_GATEWAY);
        if status.is_server_error() {
            error!(error = %e, status = status.as_u16(), "Upstream call failed");
        } else {
            warn!(error = %e, status = status.as_u16(), "Request rejected");
        }

        let api_error = Self::new(status, e.to_string());
        match e {
            ProviderError::AuthenticationFailed(_) | ProviderError::NotConfigured(_) => api_error
                .with_hint("Provide OPENAI_API_KEY or api_key via the environment or the config file."),
            ProviderError::RateLimited { retry_after_secs } => {
                api_error.with_hint(format!("Retry in {retry_after_secs} seconds."))
            }
            _ => api_error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_status() {
        let auth: ApiError = ProviderError::AuthenticationFailed("bad key".into()).into();
        assert_eq!(auth.status, StatusCode::BAD_GATEWAY);
        assert!(auth.body.hint.is_some());

        let limited: ApiError = ProviderError::RateLimited {
            retry_after_secs: 5,
        }
        .into();
        assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);

        let invalid: ApiError = ProviderError::InvalidRequest("empty".into()).into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert!(invalid.body.hint.is_none());

        let upstream: ApiError = ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        }
        .into();
        assert_eq!(upstream.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn hint_omitted_when_absent() {
        let json = serde_json::to_string(&ApiError::bad_request("nope").body).unwrap();
        assert_eq!(json, r#"{"error":"nope"}"#);
    }
}
