//! Shared application state.

use std::sync::Arc;

use tdp_auth::{CookieConfig, MemorySessionStore, OidcClient, SessionStore};
use tdp_users::UserDirectory;

/// HTTP-facing settings.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    /// Session cookie attributes.
    pub cookie: CookieConfig,
    /// Accept the `X-Username` header (local development only).
    pub header_auth: bool,
    /// Origin allowed to make credentialed cross-origin requests.
    pub frontend_origin: Option<String>,
}

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// User and STT directory.
    pub directory: UserDirectory,
    /// Session storage.
    pub sessions: Arc<dyn SessionStore>,
    /// OIDC provider client.
    pub oidc: Arc<OidcClient>,
    /// HTTP settings.
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// Creates state with an in-memory session store.
    pub fn new(directory: UserDirectory, oidc: OidcClient, config: ApiConfig) -> Self {
        Self {
            directory,
            sessions: Arc::new(MemorySessionStore::new()),
            oidc: Arc::new(oidc),
            config: Arc::new(config),
        }
    }
}
