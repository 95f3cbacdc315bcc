//! Facebook Messenger webhook.
//!
//! - `GET  /webhook` subscription verification handshake
//! - `POST /webhook` message events; each sender's messages are answered in
//!   order on one spawned task so the platform gets its acknowledgement
//!   immediately

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use schoolpilot_agent::Advisor;
use schoolpilot_channels::{MessengerChannel, VerifyQuery};
use schoolpilot_core::channel::{Channel, ChannelMessage};
use schoolpilot_core::error::ChannelError;
use schoolpilot_core::session::SessionId;

use crate::SharedState;

/// Acknowledgement body the Graph API expects.
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

const RESET_CONFIRMATION: &str = "Your conversation has been reset. What would you like to ask?";
const FAILURE_REPLY: &str = "Sorry, I can't answer right now. Please try again in a moment.";

pub fn webhook_router(state: SharedState) -> Router {
    Router::new()
        .route("/webhook", get(verify_handler).post(event_handler))
        .with_state(state)
}

async fn verify_handler(
    State(state): State<SharedState>,
    Query(query): Query<VerifyQuery>,
) -> (StatusCode, String) {
    let Some(messenger) = state.messenger.as_ref() else {
        return (StatusCode::NOT_FOUND, "Messenger channel not configured".into());
    };

    match messenger.verify_subscription(&query) {
        Ok(challenge) => (StatusCode::OK, challenge),
        Err(ChannelError::InvalidPayload(reason)) => (StatusCode::BAD_REQUEST, reason),
        Err(_) => (StatusCode::FORBIDDEN, "Forbidden".into()),
    }
}

async fn event_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(messenger) = state.messenger.clone() else {
        return (StatusCode::NOT_FOUND, "Messenger channel not configured");
    };

    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok());
    if let Err(e) = messenger.verify_signature(&body, signature) {
        warn!(
            signature = if signature.is_some() { "invalid" } else { "missing" },
            error = %e,
            "Messenger webhook signature verification failed"
        );
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "Invalid JSON payload");
    };

    let messages = messenger.parse_webhook_payload(&payload);
    debug!(count = messages.len(), "Messenger webhook received");

    for (sender, batch) in group_by_sender(messages) {
        debug!(sender = %sender, count = batch.len(), "Answering Messenger batch");
        let advisor = Arc::clone(&state.advisor);
        let messenger = Arc::clone(&messenger);
        tokio::spawn(async move {
            for msg in batch {
                answer_message(Arc::clone(&advisor), Arc::clone(&messenger), msg).await;
            }
        });
    }

    (StatusCode::OK, EVENT_RECEIVED)
}

/// Group messages by sender, keeping each sender's messages in arrival order.
fn group_by_sender(messages: Vec<ChannelMessage>) -> Vec<(String, Vec<ChannelMessage>)> {
    let mut groups: Vec<(String, Vec<ChannelMessage>)> = Vec::new();
    for msg in messages {
        match groups.iter_mut().find(|(sender, _)| *sender == msg.sender_id) {
            Some((_, batch)) => batch.push(msg),
            None => groups.push((msg.sender_id.clone(), vec![msg])),
        }
    }
    groups
}

/// Answer one inbound message: reset command or advisor reply, then deliver
/// through the Send API.
pub(crate) async fn answer_message(
    advisor: Arc<Advisor>,
    messenger: Arc<MessengerChannel>,
    msg: ChannelMessage,
) {
    let session_id = SessionId::from(&msg.sender_id);
    info!(
        sender = %msg.sender_id,
        content_len = msg.content.len(),
        "Messenger message received"
    );

    let reply = if messenger.is_reset_command(&msg.content) {
        advisor.reset(&session_id).await;
        RESET_CONFIRMATION.to_string()
    } else {
        if let Err(e) = messenger.send_typing(&msg.sender_id).await {
            debug!(error = %e, "Typing indicator failed");
        }
        match advisor.respond(&session_id, &msg.content).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(sender = %msg.sender_id, error = %e, "Advisor failed for Messenger message");
                FAILURE_REPLY.to_string()
            }
        }
    };

    if let Err(e) = messenger.send(&msg.sender_id, &reply).await {
        error!(sender = %msg.sender_id, error = %e, "Failed to deliver Messenger reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeGraphApi, MockProvider, messenger_config, test_state_with};
    use axum::body::Body;
    use axum::http::Request;
    use hmac::{Hmac, Mac};
    use http_body_util::BodyExt;
    use sha2::Sha256;
    use tower::ServiceExt;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn text_event(sender: &str, text: &str) -> String {
        serde_json::json!({
            "object": "page",
            "entry": [{
                "id": "PAGE",
                "time": 1700000000000i64,
                "messaging": [{
                    "sender": {"id": sender},
                    "recipient": {"id": "PAGE"},
                    "timestamp": 1700000000000i64,
                    "message": {"mid": "m.1", "text": text}
                }]
            }]
        })
        .to_string()
    }

    fn post_event(body: String, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Content-Type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("X-Hub-Signature-256", signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn verification_echoes_challenge() {
        let state = test_state_with(MockProvider::new("x"), Some(messenger_config(None, None)));
        let req = Request::builder()
            .uri("/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=CHALLENGE_ACCEPTED")
            .body(Body::empty())
            .unwrap();

        let response = webhook_router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "CHALLENGE_ACCEPTED");
    }

    #[tokio::test]
    async fn verification_wrong_token_forbidden() {
        let state = test_state_with(MockProvider::new("x"), Some(messenger_config(None, None)));
        let req = Request::builder()
            .uri("/webhook?hub.mode=subscribe&hub.verify_token=guess&hub.challenge=1")
            .body(Body::empty())
            .unwrap();

        let response = webhook_router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn webhook_disabled_is_not_found() {
        let state = test_state_with(MockProvider::new("x"), None);
        let response = webhook_router(state)
            .oneshot(post_event(text_event("U1", "hi"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_signature_is_unauthorized() {
        let state = test_state_with(
            MockProvider::new("x"),
            Some(messenger_config(Some("app-secret"), None)),
        );
        let body = text_event("U1", "hi");
        let signature = sign("wrong-secret", body.as_bytes());

        let response = webhook_router(state.clone())
            .oneshot(post_event(body.clone(), Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = webhook_router(state)
            .oneshot(post_event(body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let state = test_state_with(MockProvider::new("x"), Some(messenger_config(None, None)));
        let response = webhook_router(state)
            .oneshot(post_event("{not json".into(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn message_answered_through_send_api() {
        let graph = FakeGraphApi::start().await;
        let provider = MockProvider::new("Gymnázium Brno fits you.");
        let state = test_state_with(
            provider.clone(),
            Some(messenger_config(Some("app-secret"), Some(&graph.url))),
        );

        let body = text_event("USER1", "Kam na střední?");
        let signature = sign("app-secret", body.as_bytes());
        let response = webhook_router(state.clone())
            .oneshot(post_event(body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, EVENT_RECEIVED);

        let sent = graph.next_text_message().await;
        assert_eq!(sent["recipient"]["id"], "USER1");
        assert_eq!(sent["messaging_type"], "RESPONSE");
        assert_eq!(sent["message"]["text"], "Gymnázium Brno fits you.");
        assert_eq!(graph.access_token().await.as_deref(), Some("page-token"));

        let session = state.advisor.history(&SessionId::from("USER1")).await.unwrap();
        assert_eq!(session.turns[0].content, "Kam na střední?");
    }

    fn channel_message(sender: &str, text: &str) -> ChannelMessage {
        ChannelMessage {
            channel_id: schoolpilot_core::channel::ChannelId("messenger".into()),
            sender_id: sender.into(),
            content: text.into(),
            message_id: None,
            timestamp_ms: None,
        }
    }

    #[test]
    fn grouping_keeps_sender_order() {
        let groups = group_by_sender(vec![
            channel_message("A", "a1"),
            channel_message("B", "b1"),
            channel_message("A", "a2"),
        ]);
        let summary: Vec<(&str, Vec<&str>)> = groups
            .iter()
            .map(|(sender, batch)| {
                (
                    sender.as_str(),
                    batch.iter().map(|m| m.content.as_str()).collect(),
                )
            })
            .collect();
        assert_eq!(summary, vec![("A", vec!["a1", "a2"]), ("B", vec!["b1"])]);
    }

    #[tokio::test]
    async fn batch_from_one_sender_answered_in_order_with_history() {
        let graph = FakeGraphApi::start().await;
        let provider = MockProvider::numbered("reply");
        let state = test_state_with(
            provider.clone(),
            Some(messenger_config(None, Some(&graph.url))),
        );

        let body = serde_json::json!({
            "object": "page",
            "entry": [{
                "id": "PAGE",
                "time": 1700000000000i64,
                "messaging": [
                    {
                        "sender": {"id": "USER3"},
                        "recipient": {"id": "PAGE"},
                        "timestamp": 1700000000000i64,
                        "message": {"mid": "m.1", "text": "first question"}
                    },
                    {
                        "sender": {"id": "USER3"},
                        "recipient": {"id": "PAGE"},
                        "timestamp": 1700000000001i64,
                        "message": {"mid": "m.2", "text": "second question"}
                    }
                ]
            }]
        })
        .to_string();

        let response = webhook_router(state.clone())
            .oneshot(post_event(body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(graph.next_text_message().await["message"]["text"], "reply #1");
        assert_eq!(graph.next_text_message().await["message"]["text"], "reply #2");

        let second: Vec<String> = provider
            .prompt(1)
            .iter()
            .skip(1)
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(second, vec!["first question", "reply #1", "second question"]);
    }

    #[tokio::test]
    async fn reset_command_clears_session_and_confirms() {
        let graph = FakeGraphApi::start().await;
        let provider = MockProvider::new("reply");
        let state = test_state_with(
            provider.clone(),
            Some(messenger_config(None, Some(&graph.url))),
        );
        state
            .advisor
            .respond(&SessionId::from("USER1"), "earlier question")
            .await
            .unwrap();
        let calls_before = provider.call_count();

        let messenger = state.messenger.clone().unwrap();
        let msg = ChannelMessage {
            channel_id: messenger.id().clone(),
            sender_id: "USER1".into(),
            content: "/reset".into(),
            message_id: None,
            timestamp_ms: None,
        };
        answer_message(state.advisor.clone(), messenger, msg).await;

        let sent = graph.next_text_message().await;
        assert_eq!(sent["message"]["text"], RESET_CONFIRMATION);
        assert!(state.advisor.history(&SessionId::from("USER1")).await.is_none());
        assert_eq!(provider.call_count(), calls_before);
    }

    #[tokio::test]
    async fn advisor_failure_sends_apology() {
        let graph = FakeGraphApi::start().await;
        let state = test_state_with(
            MockProvider::failing(schoolpilot_core::error::ProviderError::Network(
                "down".into(),
            )),
            Some(messenger_config(None, Some(&graph.url))),
        );

        let messenger = state.messenger.clone().unwrap();
        let msg = ChannelMessage {
            channel_id: messenger.id().clone(),
            sender_id: "USER2".into(),
            content: "hello".into(),
            message_id: None,
            timestamp_ms: None,
        };
        answer_message(state.advisor.clone(), messenger, msg).await;

        let sent = graph.next_text_message().await;
        assert_eq!(sent["message"]["text"], FAILURE_REPLY);
    }
}
