//! Error types for the SchoolPilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for SchoolPilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the upstream model, speech synthesis or transcription API.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// HTTP-ish status this error should surface as at the gateway.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::RateLimited { .. } => 429,
            Self::InvalidRequest(_) => 400,
            Self::NotConfigured(_) => 503,
            _ => 502,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Unauthorized sender: {sender_id} on {channel}")]
    Unauthorized { channel: String, sender_id: String },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = Error::Config {
            message: "schools.json is not an array".into(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: schools.json is not an array"
        );
    }

    #[test]
    fn channel_error_displays_correctly() {
        let err = Error::Channel(ChannelError::DeliveryFailed {
            channel: "messenger".into(),
            reason: "page token expired".into(),
        });
        assert!(err.to_string().contains("messenger"));
        assert!(err.to_string().contains("page token expired"));
    }

    #[test]
    fn status_hints() {
        assert_eq!(
            ProviderError::RateLimited { retry_after_secs: 5 }.status_hint(),
            429
        );
        assert_eq!(ProviderError::InvalidRequest("empty".into()).status_hint(), 400);
        assert_eq!(
            ProviderError::AuthenticationFailed("bad key".into()).status_hint(),
            502
        );
    }
}
