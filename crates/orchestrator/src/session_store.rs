use std::{
    collections::HashMap,
    time::{Duration, SystemTime},
};

use tokio::sync::RwLock;
use types::{Session, SessionError, UserId};

/// In-memory session store. One session per user identity, created on first
/// event, never explicitly destroyed; [`SessionStore::sweep_idle`] evicts
/// sessions past the inactivity TTL.
///
/// The store itself only guards map access; the per-user ordering guarantee
/// (no two events for one user processed concurrently) is the engine's job.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the session for a user, creating it in the `Start` state when
    /// absent. Refreshes `last_active_at` and the routing `chat_id` on every
    /// call.
    pub async fn get_or_create(
        &self,
        user_id: &UserId,
        chat_id: i64,
    ) -> Result<Session, SessionError> {
        if user_id.as_str().trim().is_empty() {
            return Err(SessionError::InvalidUser {
                user_id: user_id.to_string(),
            });
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(user_id.clone())
            .or_insert_with(|| Session::new(user_id.clone(), chat_id));
        session.last_active_at = SystemTime::now();
        session.chat_id = chat_id;
        Ok(session.clone())
    }

    /// Idempotent overwrite.
    pub async fn save(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.user_id.clone(), session);
    }

    pub async fn get(&self, user_id: &UserId) -> Option<Session> {
        self.sessions.read().await.get(user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Evict sessions idle longer than `ttl`. Returns how many were removed.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let cutoff = SystemTime::now() - ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_active_at > cutoff);
        before - sessions.len()
    }
}
