//! The advisor: one request in, one grounded reply out.
//!
//! For every user message the advisor
//!
//! 1. takes a snapshot of the session history,
//! 2. assembles `[system + corpus] + history + [user]`,
//! 3. sends it to the provider,
//! 4. records the user turn and the reply together, only on success.

use crate::context::ContextAssembler;
use crate::corpus::{CorpusError, KnowledgeCorpus};
use crate::stream_event::AdvisorStreamEvent;
use schoolpilot_config::AppConfig;
use schoolpilot_core::error::ProviderError;
use schoolpilot_core::provider::{Provider, ProviderRequest};
use schoolpilot_core::session::{Session, SessionId, SessionStore};
use schoolpilot_memory::InMemorySessionStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct Advisor {
    provider: Arc<dyn Provider>,
    sessions: Arc<dyn SessionStore>,
    assembler: ContextAssembler,
    /// Rendered once at startup and shared by every request.
    corpus_text: Arc<str>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl Advisor {
    pub fn new(
        provider: Arc<dyn Provider>,
        sessions: Arc<dyn SessionStore>,
        assembler: ContextAssembler,
        corpus_text: impl Into<Arc<str>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            sessions,
            assembler,
            corpus_text: corpus_text.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Build an advisor from configuration: loads and renders the corpus and
    /// creates an in-memory session store with the configured cap.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, CorpusError> {
        let corpus = KnowledgeCorpus::load(&config.knowledge.corpus_path)?;
        let sessions = Arc::new(InMemorySessionStore::with_max_turns(
            config.session.max_turns,
        ));

        info!(
            provider = provider.name(),
            model = %config.model,
            schools = corpus.len(),
            max_turns = config.session.max_turns,
            "Advisor ready"
        );

        Ok(Self::new(
            provider,
            sessions,
            ContextAssembler::from_override(config.identity.system_prompt.clone()),
            corpus.render(),
            &config.model,
        )
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn corpus_text(&self) -> &str {
        &self.corpus_text
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    fn request(&self, session: &Session, text: &str, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: self
                .assembler
                .build_prompt(session, &self.corpus_text, text),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        }
    }

    fn check_input(text: &str) -> Result<(), ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("message must not be empty".into()));
        }
        Ok(())
    }

    /// Answer `text` in the context of `session_id` and record the exchange.
    ///
    /// On error the session history is left as it was.
    pub async fn respond(&self, session_id: &SessionId, text: &str) -> Result<String, ProviderError> {
        Self::check_input(text)?;

        let session = self.sessions.get_or_create(session_id).await;
        let request = self.request(&session, text, false);
        debug!(
            session = %session_id,
            history = session.len(),
            "Sending advisor request"
        );

        let response = self.provider.complete(request).await.inspect_err(|e| {
            warn!(session = %session_id, error = %e, "Advisor request failed");
        })?;
        let reply = response.message.content;

        self.sessions
            .record_exchange(session_id, text, &reply)
            .await;
        Ok(reply)
    }

    /// Answer `text` without any history; nothing is recorded.
    pub async fn respond_once(&self, text: &str) -> Result<String, ProviderError> {
        Self::check_input(text)?;

        let session = Session::new(SessionId::new());
        let request = self.request(&session, text, false);
        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }

    /// Stream the answer to `text` as [`AdvisorStreamEvent`]s.
    ///
    /// The exchange is recorded once the upstream stream finishes, right
    /// before the `done` event. Upstream errors end the stream with an
    /// `error` event and leave the session untouched, as does a receiver
    /// that is dropped mid-stream.
    pub async fn respond_stream(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<mpsc::Receiver<AdvisorStreamEvent>, ProviderError> {
        Self::check_input(text)?;

        let session = self.sessions.get_or_create(session_id).await;
        let request = self.request(&session, text, true);
        let mut upstream = self.provider.stream(request).await?;

        let (tx, rx) = mpsc::channel(64);
        let sessions = Arc::clone(&self.sessions);
        let session_id = session_id.clone();
        let user_text = text.to_string();

        tokio::spawn(async move {
            let mut reply = String::new();
            let mut usage = None;

            while let Some(item) = upstream.recv().await {
                match item {
                    Ok(chunk) => {
                        if chunk.usage.is_some() {
                            usage = chunk.usage;
                        }
                        if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                            reply.push_str(&content);
                            if tx.send(AdvisorStreamEvent::Chunk { content }).await.is_err() {
                                debug!(session = %session_id, "Stream receiver dropped");
                                return;
                            }
                        }
                        if chunk.done {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session = %session_id, error = %e, "Advisor stream failed");
                        let _ = tx
                            .send(AdvisorStreamEvent::Error {
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }

            sessions.record_exchange(&session_id, &user_text, &reply).await;
            let _ = tx
                .send(AdvisorStreamEvent::Done {
                    session_id: session_id.0,
                    usage,
                })
                .await;
        });

        Ok(rx)
    }

    /// Forget the session's history. Returns whether anything was removed.
    pub async fn reset(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.reset(session_id).await;
        info!(session = %session_id, removed, "Session reset");
        removed
    }

    pub async fn history(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.history(session_id).await
    }
}
