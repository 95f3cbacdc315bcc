//! OpenAI audio API client: text-to-speech and speech-to-text.
//!
//! - `POST /audio/speech` returns encoded audio for a text input.
//! - `POST /audio/transcriptions` takes a multipart upload and returns text.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use schoolpilot_core::error::ProviderError;
use schoolpilot_core::speech::{SpeechToText, TextToSpeech};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// OpenAI speech client implementing both directions.
pub struct OpenAiSpeech {
    base_url: String,
    api_key: String,
    tts_model: String,
    stt_model: String,
    default_voice: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAiSpeech {
    /// Create a speech client against `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            tts_model: "tts-1".into(),
            stt_model: "whisper-1".into(),
            default_voice: "alloy".into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn with_tts_model(mut self, model: impl Into<String>) -> Self {
        self.tts_model = model.into();
        self
    }

    pub fn with_stt_model(mut self, model: impl Into<String>) -> Self {
        self.stt_model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.default_voice = voice.into();
        self
    }

    /// MIME type for an uploaded file, guessed from its extension.
    fn mime_type(filename: &str) -> &'static str {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "ogg" | "oga" | "opus" => "audio/ogg",
            "mp3" | "mpga" | "mpeg" => "audio/mpeg",
            "wav" => "audio/wav",
            "m4a" | "mp4" => "audio/mp4",
            "flac" => "audio/flac",
            // Browser MediaRecorder default
            _ => "audio/webm",
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();
        match status {
            200 => Ok(response),
            429 => Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            }),
            401 | 403 => Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            )),
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                warn!(status, body = %error_body, "Speech API returned error");
                Err(ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                })
            }
        }
    }
}

#[async_trait]
impl TextToSpeech for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("text must not be empty".into()));
        }

        let body = serde_json::json!({
            "model": self.tts_model,
            "input": text,
            "voice": voice.unwrap_or(&self.default_voice),
            "response_format": "mp3",
        });

        debug!(model = %self.tts_model, chars = text.len(), "Sending speech request");

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let bytes = Self::check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        info!(chars = text.len(), bytes = bytes.len(), "Speech synthesized");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechToText for OpenAiSpeech {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ProviderError> {
        if audio.is_empty() {
            return Err(ProviderError::InvalidRequest("audio must not be empty".into()));
        }

        let size = audio.len();
        let part = Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str(Self::mime_type(filename))
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;

        let form = Form::new()
            .text("model", self.stt_model.clone())
            .part("file", part);

        debug!(model = %self.stt_model, bytes = size, "Sending transcription request");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let transcription: TranscriptionResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse transcription: {e}"),
            })?;

        Ok(transcription.text)
    }
}
