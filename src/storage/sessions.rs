// src/storage/sessions.rs
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use dashmap::DashMap;
use tokio::time::Instant;
use crate::models::user::{Session, User};

pub const SESSION_COOKIE: &str = "sid";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Signed-in sessions and OAuth flows in progress, keyed by opaque cookie values.
#[derive(Default)]
pub struct SessionStorage {
    sessions: DashMap<String, (Instant, Session)>,
    oauth_verifiers: DashMap<String, (Instant, String)>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, user: User, access_token: String) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), (Instant::now(), Session {
            user,
            access_token,
            created_at: now,
        }));
        id
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|r| r.value().1.clone())
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.remove(id).map(|(_, (_, session))| session)
    }

    pub fn begin_oauth(&self, verifier: String) -> String {
        let state = uuid::Uuid::new_v4().to_string();
        self.oauth_verifiers.insert(state.clone(), (Instant::now(), verifier));
        state
    }

    /// Verifiers are single use.
    pub fn take_oauth_verifier(&self, state: &str) -> Option<String> {
        self.oauth_verifiers.remove(state).map(|(_, (_, verifier))| verifier)
    }

    /// Drops sessions older than `session_ttl` and abandoned OAuth flows older than
    /// `verifier_ttl`. Returns how many entries went.
    pub fn cleanup_expired(&self, session_ttl: Duration, verifier_ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.sessions.len() + self.oauth_verifiers.len();

        self.sessions
            .retain(|_, (issued, _)| now.duration_since(*issued) < session_ttl);
        self.oauth_verifiers
            .retain(|_, (issued, _)| now.duration_since(*issued) < verifier_ttl);

        before.saturating_sub(self.sessions.len() + self.oauth_verifiers.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn pending_oauth(&self) -> usize {
        self.oauth_verifiers.len()
    }
}
