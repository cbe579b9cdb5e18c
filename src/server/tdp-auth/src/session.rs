//! Server-side sessions.
//!
//! A session is an opaque 64-character id carried in the `sessionid`
//! cookie and a record kept by a [`SessionStore`]. Anonymous sessions hold
//! only the OIDC state/nonce tracker between the login redirect and the
//! callback; logged-in sessions hold the user id and the raw ID token.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{now_secs, AuthError};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sessionid";

/// Default session lifetime: two weeks.
pub const SESSION_LIFETIME_SECS: u64 = 14 * 24 * 60 * 60;

/// How long a state/nonce tracker stays usable.
pub const TRACKER_MAX_AGE_SECS: u64 = 10 * 60;

const SESSION_ID_LEN: usize = 64;

/// The state and nonce issued with a login redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateNonceTracker {
    /// Opaque value echoed back by the provider.
    pub state: String,
    /// Value the provider embeds in the ID token.
    pub nonce: String,
    /// Issue time (Unix seconds).
    pub added_on: u64,
}

impl StateNonceTracker {
    /// Generates a fresh pair of 32 random bytes each, hex encoded.
    pub fn generate() -> Self {
        Self {
            state: tdp_crypto::random::generate_token(32),
            nonce: tdp_crypto::random::generate_token(32),
            added_on: now_secs(),
        }
    }

    /// Whether the tracker is older than [`TRACKER_MAX_AGE_SECS`] at `now`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_sub(self.added_on) > TRACKER_MAX_AGE_SECS
    }
}

/// Session data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session id, also the cookie value.
    pub id: String,
    /// Logged-in user, `None` for anonymous sessions.
    pub user_id: Option<Uuid>,
    /// Raw ID token from the last OIDC login.
    pub token: Option<String>,
    /// Pending OIDC state/nonce.
    pub state_nonce: Option<StateNonceTracker>,
    /// Creation time (Unix seconds).
    pub created_at: u64,
    /// Expiration time (Unix seconds).
    pub expires_at: u64,
}

impl Session {
    /// Creates an anonymous session with the default lifetime.
    pub fn anonymous() -> Self {
        Self::with_lifetime(SESSION_LIFETIME_SECS)
    }

    /// Creates an anonymous session expiring after `lifetime_secs`.
    pub fn with_lifetime(lifetime_secs: u64) -> Self {
        let now = now_secs();
        Self {
            id: generate_session_id(),
            user_id: None,
            token: None,
            state_nonce: None,
            created_at: now,
            expires_at: now.saturating_add(lifetime_secs),
        }
    }

    /// Whether the session has not expired yet.
    pub fn is_valid(&self) -> bool {
        now_secs() < self.expires_at
    }

    /// Whether a user is bound to the session.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Binds the session to a user under a fresh id.
    ///
    /// Returns the previous id so the caller can drop it from the store.
    pub fn login(&mut self, user_id: Uuid, token: impl Into<String>) -> String {
        let previous = std::mem::replace(&mut self.id, generate_session_id());
        self.user_id = Some(user_id);
        self.token = Some(token.into());
        self.state_nonce = None;
        previous
    }
}

fn generate_session_id() -> String {
    tdp_crypto::random::generate_alphanumeric(SESSION_ID_LEN)
}

/// Storage for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session with the given id unless missing or expired.
    async fn get(&self, id: &str) -> Option<Session>;

    /// Inserts or replaces a session.
    async fn save(&self, session: Session) -> Result<(), AuthError>;

    /// Removes a session.
    async fn delete(&self, id: &str) -> Result<(), AuthError>;

    /// Removes and returns the session's state/nonce tracker.
    ///
    /// At most one caller receives a given tracker.
    async fn take_state_nonce(&self, id: &str) -> Option<StateNonceTracker>;

    /// Removes expired sessions, returning how many were dropped.
    async fn purge_expired(&self) -> Result<usize, AuthError>;
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(id).filter(|s| s.is_valid()).cloned()
    }

    async fn save(&self, session: Session) -> Result<(), AuthError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AuthError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn take_state_nonce(&self, id: &str) -> Option<StateNonceTracker> {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(id)
            .filter(|s| s.is_valid())
            .and_then(|s| s.state_nonce.take())
    }

    async fn purge_expired(&self) -> Result<usize, AuthError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.is_valid());
        Ok(before - sessions.len())
    }
}

/// Attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,
    /// Whether to set the `Secure` attribute.
    pub secure: bool,
    /// `Max-Age` in seconds.
    pub max_age: u64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: SESSION_COOKIE.to_string(),
            secure: true,
            max_age: SESSION_LIFETIME_SECS,
        }
    }
}

impl CookieConfig {
    /// `Set-Cookie` value carrying the session id.
    pub fn session_cookie(&self, session_id: &str) -> String {
        self.render(session_id, self.max_age)
    }

    /// `Set-Cookie` value that removes the cookie.
    pub fn clear_cookie(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
            self.name
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Extracts this cookie's value from a `Cookie` request header.
    pub fn extract<'a>(&self, cookie_header: &'a str) -> Option<&'a str> {
        cookie_header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }
}
