//! Facebook Messenger channel adapter.
//!
//! Inbound messages arrive as Graph API webhooks on the gateway; this module
//! verifies the subscription handshake and the `X-Hub-Signature-256` header,
//! extracts text messages from the payload, and sends replies through the
//! Send API.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use schoolpilot_config::MessengerConfig;
use schoolpilot_core::channel::{Channel, ChannelId, ChannelMessage};
use schoolpilot_core::error::ChannelError;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Longest text the Send API accepts in one message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Query parameters of the subscription verification request.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Messenger channel adapter.
pub struct MessengerChannel {
    config: MessengerConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
}

impl MessengerChannel {
    pub fn new(config: MessengerConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("messenger".into()),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Answer the subscription handshake.
    ///
    /// Returns the challenge to echo back when `hub.mode` is `subscribe` and
    /// the token equals the configured verify token.
    pub fn verify_subscription(&self, query: &VerifyQuery) -> Result<String, ChannelError> {
        let token_matches = match (
            self.config.verify_token.as_deref(),
            query.verify_token.as_deref(),
        ) {
            (Some(expected), Some(provided)) if !expected.is_empty() => {
                constant_time_eq(expected.as_bytes(), provided.as_bytes())
            }
            _ => false,
        };

        if query.mode.as_deref() != Some("subscribe") || !token_matches {
            warn!("Messenger webhook verification failed");
            return Err(ChannelError::Unauthorized {
                channel: self.name().into(),
                sender_id: "webhook-verification".into(),
            });
        }

        let challenge = query.challenge.clone().ok_or_else(|| {
            ChannelError::InvalidPayload("missing hub.challenge".into())
        })?;
        info!("Messenger webhook verified");
        Ok(challenge)
    }

    /// Verify an `X-Hub-Signature-256` header (`sha256=<hex>`) over the raw
    /// request body.
    ///
    /// Without a configured app secret every request is accepted. With one,
    /// a missing, malformed or mismatching header is `InvalidSignature`.
    pub fn verify_signature(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<(), ChannelError> {
        let secret = match self.config.app_secret.as_deref() {
            None | Some("") => return Ok(()),
            Some(secret) => secret,
        };

        let provided = signature
            .and_then(|s| s.strip_prefix("sha256="))
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or(ChannelError::InvalidSignature)?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| ChannelError::InvalidSignature)?;
        mac.update(payload);

        // Constant-time comparison
        mac.verify_slice(&provided)
            .map_err(|_| ChannelError::InvalidSignature)
    }

    /// Extract text messages from a webhook payload.
    ///
    /// Only `object == "page"` payloads are considered. Echoes of the page's
    /// own messages, non-text events and senders outside the allowlist are
    /// skipped.
    pub fn parse_webhook_payload(&self, payload: &serde_json::Value) -> Vec<ChannelMessage> {
        let mut messages = Vec::new();

        if payload.get("object").and_then(|o| o.as_str()) != Some("page") {
            debug!("Ignoring non-page webhook payload");
            return messages;
        }

        let Some(entries) = payload.get("entry").and_then(|e| e.as_array()) else {
            return messages;
        };

        for entry in entries {
            let Some(events) = entry.get("messaging").and_then(|m| m.as_array()) else {
                continue;
            };

            for event in events {
                let Some(sender_id) = event
                    .get("sender")
                    .and_then(|s| s.get("id"))
                    .and_then(|id| id.as_str())
                else {
                    continue;
                };

                let Some(message) = event.get("message") else {
                    debug!(sender = %sender_id, "Skipping non-message event");
                    continue;
                };

                if message.get("is_echo").and_then(|e| e.as_bool()) == Some(true) {
                    continue;
                }

                let Some(text) = message.get("text").and_then(|t| t.as_str()) else {
                    debug!(sender = %sender_id, "Skipping non-text message");
                    continue;
                };
                if text.trim().is_empty() {
                    continue;
                }

                if !self.is_allowed(sender_id) {
                    warn!(sender = %sender_id, "Ignoring message from sender outside the allowlist");
                    continue;
                }

                messages.push(ChannelMessage {
                    channel_id: self.channel_id.clone(),
                    sender_id: sender_id.to_string(),
                    content: text.to_string(),
                    message_id: message
                        .get("mid")
                        .and_then(|m| m.as_str())
                        .map(str::to_string),
                    timestamp_ms: event.get("timestamp").and_then(|t| t.as_i64()),
                });
            }
        }

        messages
    }

    /// Whether `text` asks to forget the conversation.
    pub fn is_reset_command(&self, text: &str) -> bool {
        if !self.config.reset_command {
            return false;
        }
        let text = text.trim();
        text.eq_ignore_ascii_case("reset") || text.eq_ignore_ascii_case("/reset")
    }

    async fn post_send_api(&self, body: serde_json::Value) -> Result<(), ChannelError> {
        let token = self.config.page_access_token.as_deref().ok_or_else(|| {
            ChannelError::NotConfigured("messenger page_access_token is not set".into())
        })?;

        let url = format!(
            "{}/me/messages",
            self.config.graph_api_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", token)])
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "messenger".into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error = response.text().await.unwrap_or_default();
            return Err(ChannelError::DeliveryFailed {
                channel: "messenger".into(),
                reason: format!("Send API returned {status}: {error}"),
            });
        }
        Ok(())
    }
}

/// Split `text` into pieces of at most `max_chars` characters, preferring to
/// break at a newline or space. Whitespace-only pieces are dropped, so a
/// blank text yields no pieces.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let hard_end = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        let window = &rest[..hard_end];

        let end = if rest[hard_end..].starts_with(['\n', ' ']) {
            hard_end
        } else {
            match window.rfind(['\n', ' ']) {
                Some(i) if i > 0 => i,
                _ => hard_end,
            }
        };

        let part = rest[..end].trim_end();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        rest = rest[end..].trim_start();
    }

    let rest = rest.trim_end();
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl Channel for MessengerChannel {
    fn name(&self) -> &str {
        "messenger"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn send(&self, recipient_id: &str, content: &str) -> Result<(), ChannelError> {
        let parts = split_message(content, MAX_MESSAGE_CHARS);
        if parts.is_empty() {
            warn!(recipient = %recipient_id, "Not sending a blank Messenger reply");
            return Ok(());
        }
        for part in &parts {
            self.post_send_api(serde_json::json!({
                "recipient": { "id": recipient_id },
                "messaging_type": "RESPONSE",
                "message": { "text": part },
            }))
            .await?;
        }

        info!(
            recipient = %recipient_id,
            parts = parts.len(),
            content_len = content.len(),
            "Messenger reply sent"
        );
        Ok(())
    }

    async fn send_typing(&self, recipient_id: &str) -> Result<(), ChannelError> {
        self.post_send_api(serde_json::json!({
            "recipient": { "id": recipient_id },
            "sender_action": "typing_on",
        }))
        .await
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        let allowed = &self.config.allowed_senders;
        allowed.is_empty() || allowed.iter().any(|s| s == "*" || s == sender_id)
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self
            .config
            .page_access_token
            .as_deref()
            .is_some_and(|t| !t.is_empty()))
    }
}
