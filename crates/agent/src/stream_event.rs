//! Advisor-level streaming events.
//!
//! `AdvisorStreamEvent` wraps provider stream chunks into the events the
//! gateway forwards to clients over SSE.

use schoolpilot_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted while a reply is streamed:
/// - `chunk` partial text from the model
/// - `done` the reply is complete and recorded in the session
/// - `error` the upstream call failed; nothing was recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdvisorStreamEvent {
    Chunk { content: String },

    Done {
        session_id: String,
        usage: Option<Usage>,
    },

    Error { message: String },
}

impl AdvisorStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
