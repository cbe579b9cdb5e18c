//! # TDP Auth
//!
//! Authentication for the TANF Data Portal.
//!
//! ## Supported Methods
//!
//! - login.gov OpenID Connect (authorization code flow with a signed
//!   client assertion)
//! - Server-side sessions carried by the `sessionid` cookie
//! - `X-Username` header lookup (local development only)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod assertion;
pub mod backend;
pub mod context;
pub mod error;
pub mod lookup;
pub mod oidc;
pub mod session;

pub use backend::AuthBackend;
pub use context::{AuthContext, AuthMethod};
pub use error::AuthError;
pub use lookup::{HeaderAuthentication, UsernameLookup, USERNAME_HEADER};
pub use oidc::{validate_nonce_and_state, OidcClient, OidcConfig, VerifiedLogin};
pub use session::{
    CookieConfig, MemorySessionStore, Session, SessionStore, StateNonceTracker, SESSION_COOKIE,
};

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
