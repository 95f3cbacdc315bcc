//! Upstream API clients for SchoolPilot.
//!
//! The chat provider implements `schoolpilot_core::Provider`; the speech
//! client implements `TextToSpeech` and `SpeechToText`.

pub mod openai_compat;
pub mod speech;

pub use openai_compat::OpenAiCompatProvider;
pub use speech::OpenAiSpeech;

use schoolpilot_config::AppConfig;
use schoolpilot_core::error::ProviderError;
use std::sync::Arc;

/// Build the chat provider described by the configuration.
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<OpenAiCompatProvider>, ProviderError> {
    let api_key = config.api_key.as_deref().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key: set OPENAI_API_KEY or api_key in the config file".into(),
        )
    })?;
    Ok(Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.api_url,
        api_key,
    )))
}

/// Build the speech client described by the configuration.
pub fn speech_from_config(config: &AppConfig) -> Result<Arc<OpenAiSpeech>, ProviderError> {
    let api_key = config.api_key.as_deref().ok_or_else(|| {
        ProviderError::NotConfigured("no API key configured for speech".into())
    })?;
    Ok(Arc::new(
        OpenAiSpeech::new(&config.api_url, api_key)
            .with_tts_model(&config.speech.tts_model)
            .with_stt_model(&config.speech.stt_model)
            .with_voice(&config.speech.voice),
    ))
}
