//! Text-to-speech and speech-to-text traits.
//!
//! Both are delegated to the external API; these traits let the gateway
//! serve `/tts` and `/stt` without knowing which backend is configured.

use crate::error::ProviderError;
use async_trait::async_trait;

/// Synthesizes spoken audio from text.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` and return encoded audio bytes.
    ///
    /// `voice` overrides the implementation's default voice.
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, ProviderError>;

    /// MIME type of the bytes returned by `synthesize`.
    fn content_type(&self) -> &'static str {
        "audio/mpeg"
    }
}

/// Transcribes recorded audio into text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe `audio`. `filename` carries the container format
    /// (e.g. `audio.webm`), which the upstream API uses to pick a decoder.
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ProviderError>;
}
