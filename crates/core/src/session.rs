//! Session domain types and the session store trait.
//!
//! A session is one conversation's bounded turn history, keyed by an
//! opaque id the caller supplies (a web client's session id or a Messenger
//! sender id). History is capped FIFO: once more than `max_turns` turns are
//! recorded, the oldest are evicted first.

use crate::message::{Message, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of turns a session keeps unless configured otherwise.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Mint a fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation's capped turn history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session key
    pub id: SessionId,

    /// Turns in chronological order, never longer than `max_turns`
    pub turns: Vec<Message>,

    /// History cap
    pub max_turns: usize,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session with the default cap.
    pub fn new(id: SessionId) -> Self {
        Self::with_max_turns(id, DEFAULT_MAX_TURNS)
    }

    /// Create an empty session with an explicit cap (at least one turn).
    pub fn with_max_turns(id: SessionId, max_turns: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            turns: Vec::new(),
            max_turns: max_turns.max(1),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append one turn, evicting the oldest turns beyond the cap.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.turns.push(message);
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
    }

    /// Append a turn built from a role and text.
    pub fn append_turn(&mut self, role: Role, text: impl Into<String>) {
        self.push(Message::new(role, text));
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Storage for sessions, shared by every request handler.
///
/// All operations are infallible: an unknown id simply means an empty
/// session. Implementations must serialize read-modify-write of a single
/// session so concurrent appends never lose a turn.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Return a snapshot of the session, creating an empty one if absent.
    async fn get_or_create(&self, id: &SessionId) -> Session;

    /// Snapshot of an existing session without creating it.
    async fn history(&self, id: &SessionId) -> Option<Session>;

    /// Append one turn to the session (created if absent).
    async fn append_turn(&self, id: &SessionId, role: Role, text: &str);

    /// Append a user turn and the assistant reply under one lock acquisition.
    async fn record_exchange(&self, id: &SessionId, user: &str, assistant: &str);

    /// Remove the session. Returns whether one existed; never errors.
    async fn reset(&self, id: &SessionId) -> bool;

    /// Number of live sessions.
    async fn len(&self) -> usize;
}
