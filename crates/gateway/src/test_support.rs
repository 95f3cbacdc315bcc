//! Shared fixtures for gateway tests.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::post,
};
use schoolpilot_agent::{Advisor, ContextAssembler};
use schoolpilot_channels::MessengerChannel;
use schoolpilot_config::MessengerConfig;
use schoolpilot_core::error::ProviderError;
use schoolpilot_core::message::Message;
use schoolpilot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use schoolpilot_core::speech::{SpeechToText, TextToSpeech};
use schoolpilot_memory::InMemorySessionStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::{GatewayState, SharedState};

pub const TEST_CORPUS: &str = "Secondary schools and their programs:\n\nGymnázium, Brno\n";

/// Mock provider with a fixed reply (or a fixed error) that records prompts.
pub struct MockProvider {
    reply: Result<String, ProviderError>,
    /// Append " #N" (N = call number) to every reply.
    numbered: bool,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl MockProvider {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            numbered: false,
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Replies "<text> #1", "<text> #2", ... in call order.
    pub fn numbered(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            numbered: true,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            numbered: false,
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// The prompt of the `index`-th call (0-based).
    pub fn prompt(&self, index: usize) -> Vec<Message> {
        self.prompts.lock().unwrap()[index].clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        let prompts = self.prompts.lock().unwrap();
        prompts.last()?.first().map(|m| m.content.clone())
    }

    pub fn last_prompt_len(&self) -> usize {
        self.prompts.lock().unwrap().last().map_or(0, Vec::len)
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "gateway_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.messages);
            prompts.len()
        };
        let mut text = self.reply.clone()?;
        if self.numbered {
            text = format!("{text} #{call}");
        }
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// Speech mock: "synthesizes" `MP3:<voice>:<text>` and "transcribes" to a
/// description of the upload.
pub struct MockSpeech;

#[async_trait::async_trait]
impl TextToSpeech for MockSpeech {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, ProviderError> {
        Ok(format!("MP3:{}:{text}", voice.unwrap_or("alloy")).into_bytes())
    }
}

#[async_trait::async_trait]
impl SpeechToText for MockSpeech {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, ProviderError> {
        Ok(format!("transcript of {filename} ({} bytes)", audio.len()))
    }
}

pub fn messenger_config(app_secret: Option<&str>, graph_api_url: Option<&str>) -> MessengerConfig {
    let mut config = MessengerConfig {
        enabled: true,
        verify_token: Some("verify-me".into()),
        page_access_token: Some("page-token".into()),
        app_secret: app_secret.map(str::to_string),
        ..MessengerConfig::default()
    };
    if let Some(url) = graph_api_url {
        config.graph_api_url = url.to_string();
    }
    config
}

pub fn test_state(provider: Arc<MockProvider>) -> SharedState {
    test_state_with(provider, None)
}

pub fn test_state_with(
    provider: Arc<MockProvider>,
    messenger: Option<MessengerConfig>,
) -> SharedState {
    let advisor = Advisor::new(
        provider,
        Arc::new(InMemorySessionStore::new()),
        ContextAssembler::default(),
        TEST_CORPUS,
        "mock-model",
    );
    Arc::new(GatewayState {
        advisor: Arc::new(advisor),
        tts: Arc::new(MockSpeech),
        stt: Arc::new(MockSpeech),
        messenger: messenger.map(|c| Arc::new(MessengerChannel::new(c))),
    })
}

/// A local stand-in for the Graph API Send endpoint.
pub struct FakeGraphApi {
    pub url: String,
    received: tokio::sync::Mutex<mpsc::UnboundedReceiver<serde_json::Value>>,
    token: Arc<Mutex<Option<String>>>,
}

#[derive(Clone)]
struct FakeGraphState {
    tx: mpsc::UnboundedSender<serde_json::Value>,
    token: Arc<Mutex<Option<String>>>,
}

async fn fake_send(
    State(state): State<FakeGraphState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    *state.token.lock().unwrap() = query.get("access_token").cloned();
    let recipient = body["recipient"]["id"].clone();
    let _ = state.tx.send(body);
    Json(serde_json::json!({ "recipient_id": recipient, "message_id": "mid.fake" }))
}

impl FakeGraphApi {
    pub async fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route("/me/messages", post(fake_send))
            .with_state(FakeGraphState {
                tx,
                token: token.clone(),
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            received: tokio::sync::Mutex::new(rx),
            token,
        }
    }

    /// Next Send API body carrying a text message, skipping sender actions.
    pub async fn next_text_message(&self) -> serde_json::Value {
        let mut rx = self.received.lock().await;
        loop {
            let body = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for Send API call")
                .expect("fake Graph API stopped");
            if body.get("message").is_some() {
                return body;
            }
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}
