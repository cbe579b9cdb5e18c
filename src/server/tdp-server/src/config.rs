//! Server configuration from flags and environment.

use std::path::PathBuf;

use clap::Parser;
use tdp_api::ApiConfig;
use tdp_auth::{CookieConfig, OidcConfig};

#[derive(Debug, Parser)]
#[command(name = "tdp-server")]
#[command(about = "TANF Data Portal - users and login.gov authentication API")]
#[command(version)]
pub struct ServerConfig {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8080", env = "TDP_BIND_ADDRESS")]
    pub bind: String,

    /// Directory holding the SQLite database
    #[arg(long, default_value = "data", env = "TDP_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Database name (file stem)
    #[arg(long, default_value = "tdp", env = "TDP_DATABASE")]
    pub database: String,

    /// Public base URL of the API, including `/v1`
    #[arg(long, env = "BASE_URL")]
    pub base_url: String,

    /// Frontend origin allowed by CORS
    #[arg(long, env = "FRONTEND_BASE_URL")]
    pub frontend_base_url: Option<String>,

    /// Client id registered with login.gov
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: String,

    /// RSA private key (PEM, optionally base64 wrapped) for client assertions
    #[arg(long, env = "JWT_KEY", hide_env_values = true)]
    pub jwt_key: String,

    /// Provider authorization endpoint
    #[arg(long, env = "OIDC_OP_AUTHORIZATION_ENDPOINT")]
    pub authorization_endpoint: String,

    /// Provider token endpoint
    #[arg(long, env = "OIDC_OP_TOKEN_ENDPOINT")]
    pub token_endpoint: String,

    /// Provider JWKS endpoint
    #[arg(long, env = "OIDC_OP_JWKS_ENDPOINT")]
    pub jwks_endpoint: String,

    /// Expected ID token issuer
    #[arg(long, env = "OIDC_OP_ISSUER")]
    pub issuer: String,

    /// Provider logout endpoint
    #[arg(long, env = "OIDC_OP_LOGOUT_ENDPOINT")]
    pub logout_endpoint: String,

    /// Accept the X-Username header (local development only)
    #[arg(long, env = "TDP_DEV_HEADER_AUTH")]
    pub dev_header_auth: bool,

    /// Omit the Secure attribute on the session cookie
    #[arg(long, env = "TDP_INSECURE_COOKIES")]
    pub insecure_cookies: bool,
}

impl ServerConfig {
    /// Provider settings.
    pub fn oidc(&self) -> OidcConfig {
        OidcConfig {
            client_id: self.client_id.clone(),
            authorization_endpoint: self.authorization_endpoint.clone(),
            token_endpoint: self.token_endpoint.clone(),
            jwks_endpoint: self.jwks_endpoint.clone(),
            issuer: self.issuer.clone(),
            logout_endpoint: self.logout_endpoint.clone(),
            base_url: self.base_url.clone(),
        }
    }

    /// HTTP settings.
    pub fn api(&self) -> ApiConfig {
        ApiConfig {
            cookie: CookieConfig {
                secure: !self.insecure_cookies,
                ..CookieConfig::default()
            },
            header_auth: self.dev_header_auth,
            frontend_origin: self.frontend_base_url.clone(),
        }
    }
}
