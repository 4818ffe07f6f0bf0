//! services/api/src/adapters/session_store.rs
//!
//! In-process session storage. Sessions live only as long as the server
//! process and are never written anywhere else.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use study_path_core::domain::SessionState;
use study_path_core::ports::{PortError, PortResult, SessionRepository};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_SESSION_LIMIT: usize = 1_000;

#[derive(Default)]
struct Sessions {
    by_id: HashMap<Uuid, Arc<SessionState>>,
    /// Insertion order, oldest first, for eviction.
    order: VecDeque<Uuid>,
}

/// An in-memory `SessionRepository` that evicts the oldest session once
/// `max_sessions` is reached.
pub struct InMemorySessionStore {
    sessions: RwLock<Sessions>,
    max_sessions: usize,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_max_sessions(DEFAULT_SESSION_LIMIT)
    }

    pub fn with_max_sessions(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            max_sessions: max_sessions.max(1),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionStore {
    async fn get(&self, session_id: Uuid) -> PortResult<Arc<SessionState>> {
        self.sessions
            .read()
            .await
            .by_id
            .get(&session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("session {session_id}")))
    }

    async fn put(&self, state: SessionState) -> PortResult<Arc<SessionState>> {
        let mut sessions = self.sessions.write().await;
        let id = state.id;

        if !sessions.by_id.contains_key(&id) && sessions.by_id.len() >= self.max_sessions {
            if let Some(oldest) = sessions.order.pop_front() {
                sessions.by_id.remove(&oldest);
                debug!(session_id = %oldest, "Evicted oldest session.");
            }
        }
        if !sessions.by_id.contains_key(&id) {
            sessions.order.push_back(id);
        }

        let state = Arc::new(state);
        sessions.by_id.insert(id, state.clone());
        Ok(state)
    }

    async fn replace(&self, state: SessionState) -> PortResult<Arc<SessionState>> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .by_id
            .get_mut(&state.id)
            .ok_or_else(|| PortError::NotFound(format!("session {}", state.id)))?;
        let state = Arc::new(state);
        *slot = state.clone();
        Ok(state)
    }

    async fn remove(&self, session_id: Uuid) -> PortResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.by_id.remove(&session_id);
        sessions.order.retain(|id| *id != session_id);
        Ok(())
    }
}
