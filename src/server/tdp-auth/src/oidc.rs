//! login.gov OpenID Connect client.
//!
//! Builds the authorization and logout redirects, exchanges authorization
//! codes at the token endpoint and verifies the returned ID token against
//! the provider's published keys.

use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::assertion::ClientAssertionSigner;
use crate::{now_secs, AuthError, StateNonceTracker};

/// Identity assurance level requested from login.gov.
pub const IAL1_ACR: &str = "http://idmanagement.gov/ns/assurance/ial/1";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider endpoints and client registration.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    /// Client id registered with the provider.
    pub client_id: String,
    /// Authorization endpoint.
    pub authorization_endpoint: String,
    /// Token endpoint; also the client assertion audience.
    pub token_endpoint: String,
    /// JWKS endpoint.
    pub jwks_endpoint: String,
    /// Expected `iss` of ID tokens.
    pub issuer: String,
    /// End-session endpoint.
    pub logout_endpoint: String,
    /// Public base URL of this API, e.g. `https://tdp.example.gov/v1`.
    pub base_url: String,
}

impl OidcConfig {
    /// Where the provider sends the user back after login.
    pub fn redirect_uri(&self) -> String {
        format!("{}/login", self.base_url.trim_end_matches('/'))
    }

    /// Where the provider sends the user back after logout.
    pub fn post_logout_redirect_uri(&self) -> String {
        format!("{}/logout", self.base_url.trim_end_matches('/'))
    }

    /// Authorization URL for a login redirect carrying the tracker's
    /// state and nonce.
    pub fn authorization_url(&self, tracker: &StateNonceTracker) -> Result<Url, AuthError> {
        let mut url = parse_endpoint("authorization", &self.authorization_endpoint)?;
        url.query_pairs_mut()
            .append_pair("acr_values", IAL1_ACR)
            .append_pair("client_id", &self.client_id)
            .append_pair("nonce", &tracker.nonce)
            .append_pair("prompt", "select_account")
            .append_pair("redirect_uri", &self.redirect_uri())
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email")
            .append_pair("state", &tracker.state);
        Ok(url)
    }

    /// Provider logout URL; `id_token` is sent as the hint when known.
    pub fn logout_url(&self, id_token: Option<&str>) -> Result<Url, AuthError> {
        let mut url = parse_endpoint("logout", &self.logout_endpoint)?;
        url.query_pairs_mut()
            .append_pair("id_token_hint", id_token.unwrap_or_default())
            .append_pair("post_logout_redirect_uri", &self.post_logout_redirect_uri())
            .append_pair("state", &tdp_crypto::random::generate_token(32));
        Ok(url)
    }
}

fn parse_endpoint(name: &str, raw: &str) -> Result<Url, AuthError> {
    Url::parse(raw).map_err(|e| AuthError::Configuration(format!("invalid {name} endpoint: {e}")))
}

/// Checks the returned state and the ID token nonce against the issued pair.
///
/// Both must match exactly.
pub fn validate_nonce_and_state(
    decoded_nonce: &str,
    state: &str,
    session_nonce: &str,
    session_state: &str,
) -> bool {
    decoded_nonce == session_nonce && state == session_state
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Claims read from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Provider subject id.
    pub sub: String,
    /// Verified email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Nonce echoed from the authorization request.
    #[serde(default)]
    pub nonce: Option<String>,
    /// Issuer.
    pub iss: String,
    /// Expiration (Unix seconds).
    pub exp: u64,
}

/// Outcome of a successful callback.
#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    /// The raw ID token, kept for the logout hint.
    pub id_token: String,
    /// Email claim, used as the local username.
    pub email: String,
    /// All verified claims.
    pub claims: IdTokenClaims,
}

/// HTTP client for one OIDC provider.
pub struct OidcClient {
    config: OidcConfig,
    signer: ClientAssertionSigner,
    http: reqwest::Client,
}

impl OidcClient {
    /// Creates the client, loading the RSA key used for client assertions.
    pub fn new(config: OidcConfig, private_key: &str) -> Result<Self, AuthError> {
        let signer =
            ClientAssertionSigner::from_pem(&config.client_id, &config.token_endpoint, private_key)?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            signer,
            http,
        })
    }

    /// The provider configuration.
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Exchanges an authorization code for the raw ID token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let body = self.signer.token_endpoint_parameters(code)?;

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::TokenExchange(format!(
                "token endpoint returned {status}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("malformed token response: {e}")))?;

        tokens
            .id_token
            .ok_or_else(|| AuthError::TokenExchange("token response has no id_token".into()))
    }

    /// Fetches the provider's signing keys.
    pub async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .http
            .get(&self.config.jwks_endpoint)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed JWKS: {e}")))
    }

    /// Verifies the ID token's signature, issuer, audience and expiry.
    pub async fn verify_id_token(&self, id_token: &str) -> Result<IdTokenClaims, AuthError> {
        let header =
            decode_header(id_token).map_err(|e| AuthError::InvalidIdToken(e.to_string()))?;

        let jwks = self.fetch_jwks().await?;
        let jwk = header
            .kid
            .as_deref()
            .and_then(|kid| jwks.find(kid))
            .or_else(|| jwks.keys.first())
            .ok_or_else(|| AuthError::Provider("JWKS contains no keys".into()))?;

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::Provider(format!("unusable JWK: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.client_id]);
        validation.leeway = 0;

        decode::<IdTokenClaims>(id_token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidIdToken(e.to_string()))
    }

    /// Runs the callback half of the flow for a code and returned state.
    ///
    /// The tracker must be the one issued with the login redirect.
    pub async fn complete_login(
        &self,
        code: &str,
        state: &str,
        tracker: &StateNonceTracker,
    ) -> Result<VerifiedLogin, AuthError> {
        if tracker.is_expired_at(now_secs()) {
            warn!("OIDC state/nonce tracker expired");
            return Err(AuthError::StateExpired);
        }

        let id_token = self.exchange_code(code).await?;
        let claims = self.verify_id_token(&id_token).await?;

        let nonce = claims.nonce.as_deref().unwrap_or_default();
        if !validate_nonce_and_state(nonce, state, &tracker.nonce, &tracker.state) {
            warn!(sub = %claims.sub, "OIDC nonce or state mismatch");
            return Err(AuthError::StateMismatch);
        }

        let email = claims
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::InvalidIdToken("missing email claim".into()))?;

        debug!(sub = %claims.sub, "OIDC login verified");
        Ok(VerifiedLogin {
            id_token,
            email,
            claims,
        })
    }
}
