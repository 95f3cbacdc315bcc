//! In-memory session store with one lock per session.
//!
//! The map lock is held only long enough to find, insert or remove a
//! session handle. Reads and appends on a session hold that session's own
//! mutex, so appends to one session are serialized while different sessions
//! never contend.

use async_trait::async_trait;
use schoolpilot_core::message::{Message, Role};
use schoolpilot_core::session::{DEFAULT_MAX_TURNS, Session, SessionId, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

type SessionHandle = Arc<Mutex<Session>>;

/// Process-local session store.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    max_turns: usize,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_max_turns(DEFAULT_MAX_TURNS)
    }

    /// Store whose sessions keep at most `max_turns` turns.
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    async fn handle(&self, id: &SessionId) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session = %id, "Session created");
                Arc::new(Mutex::new(Session::with_max_turns(
                    id.clone(),
                    self.max_turns,
                )))
            })
            .clone()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_or_create(&self, id: &SessionId) -> Session {
        let handle = self.handle(id).await;
        let session = handle.lock().await;
        session.clone()
    }

    async fn history(&self, id: &SessionId) -> Option<Session> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    async fn append_turn(&self, id: &SessionId, role: Role, text: &str) {
        let handle = self.handle(id).await;
        handle.lock().await.append_turn(role, text);
    }

    async fn record_exchange(&self, id: &SessionId, user: &str, assistant: &str) {
        let handle = self.handle(id).await;
        let mut session = handle.lock().await;
        session.push(Message::user(user));
        session.push(Message::assistant(assistant));
    }

    async fn reset(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!(session = %id, "Session reset");
        }
        removed
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
