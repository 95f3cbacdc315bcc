//! Configuration loading, validation, and management for SchoolPilot.
//!
//! Loads configuration from `~/.schoolpilot/config.toml` (or an explicit
//! path) with environment variable overrides. Validates all settings at
//! startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the OpenAI-compatible upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the upstream API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session history configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Knowledge corpus configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// System prompt configuration
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Speech synthesis / transcription configuration
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Facebook Messenger webhook configuration
    #[serde(default)]
    pub messenger: MessengerConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("gateway", &self.gateway)
            .field("session", &self.session)
            .field("knowledge", &self.knowledge)
            .field("identity", &self.identity)
            .field("speech", &self.speech)
            .field("messenger", &self.messenger)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS (the web client)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Request body limit; must fit uploaded audio
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}
fn default_max_body_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Turns kept per session; older turns are evicted first
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_max_turns() -> usize {
    20
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// JSON file with the school corpus. A missing file means an empty corpus.
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/schools.json")
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Replace the built-in advisor instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_stt_model")]
    pub stt_model: String,
}

fn default_tts_model() -> String {
    "tts-1".into()
}
fn default_voice() -> String {
    "alloy".into()
}
fn default_stt_model() -> String {
    "whisper-1".into()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            tts_model: default_tts_model(),
            voice: default_voice(),
            stt_model: default_stt_model(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Token Facebook echoes back during subscription verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,

    /// Page access token for the Send API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_access_token: Option<String>,

    /// App secret for `X-Hub-Signature-256` validation. None = no validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,

    #[serde(default = "default_graph_api_url")]
    pub graph_api_url: String,

    /// Allowlist of sender IDs. Empty or ["*"] = allow all.
    #[serde(default = "default_allowed_senders")]
    pub allowed_senders: Vec<String>,

    /// Whether a "reset" message clears the sender's history
    #[serde(default = "default_true")]
    pub reset_command: bool,
}

fn default_graph_api_url() -> String {
    "https://graph.facebook.com/v19.0".into()
}
fn default_allowed_senders() -> Vec<String> {
    vec!["*".into()]
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verify_token: None,
            page_access_token: None,
            app_secret: None,
            graph_api_url: default_graph_api_url(),
            allowed_senders: default_allowed_senders(),
            reset_command: true,
        }
    }
}

impl std::fmt::Debug for MessengerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerConfig")
            .field("enabled", &self.enabled)
            .field("verify_token", &redact(&self.verify_token))
            .field("page_access_token", &redact(&self.page_access_token))
            .field("app_secret", &redact(&self.app_secret))
            .field("graph_api_url", &self.graph_api_url)
            .field("allowed_senders", &self.allowed_senders)
            .field("reset_command", &self.reset_command)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.schoolpilot/config.toml)
    /// and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// API key priority: `SCHOOLPILOT_API_KEY`, `OPENAI_API_KEY`, `api_key`,
    /// and only when the file did not set one.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["SCHOOLPILOT_API_KEY", "OPENAI_API_KEY", "api_key"]
                .iter()
                .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        }

        if let Some(model) = lookup("SCHOOLPILOT_MODEL") {
            self.model = model;
        }

        if let Some(path) = lookup("SCHOOLPILOT_CORPUS") {
            self.knowledge.corpus_path = PathBuf::from(path);
        }

        if let Some(token) = lookup("VERIFY_TOKEN") {
            self.messenger.verify_token = Some(token);
        }
        if let Some(token) = lookup("PAGE_ACCESS_TOKEN") {
            self.messenger.page_access_token = Some(token);
        }
        if let Some(secret) = lookup("APP_SECRET") {
            self.messenger.app_secret = Some(secret);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".schoolpilot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.session.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_turns must be > 0".into(),
            ));
        }

        if self.messenger.enabled
            && (self.messenger.verify_token.is_none() || self.messenger.page_access_token.is_none())
        {
            return Err(ConfigError::ValidationError(
                "messenger.enabled requires verify_token and page_access_token".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            gateway: GatewayConfig::default(),
            session: SessionConfig::default(),
            knowledge: KnowledgeConfig::default(),
            identity: IdentityConfig::default(),
            speech: SpeechConfig::default(),
            messenger: MessengerConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
