//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username lookup found no local user.
    #[error("No such user")]
    NoSuchUser,

    /// Callback arrived without a state/nonce tracker in the session.
    #[error("OIDC session state not found")]
    SessionStateMissing,

    /// Returned state or nonce differs from the issued pair.
    #[error("Could not validate nonce and state")]
    StateMismatch,

    /// The state/nonce tracker outlived its window.
    #[error("OIDC state expired")]
    StateExpired,

    /// The authorization code could not be exchanged.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The ID token failed verification.
    #[error("invalid ID token: {0}")]
    InvalidIdToken(String),

    /// The provider's signing keys could not be retrieved.
    #[error("identity provider unavailable: {0}")]
    Provider(String),

    /// Backend configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<tdp_users::UsersError> for AuthError {
    fn from(e: tdp_users::UsersError) -> Self {
        AuthError::Storage(e.to_string())
    }
}
