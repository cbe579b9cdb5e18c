//! `private_key_jwt` client authentication.
//!
//! The token endpoint authenticates the client with a short-lived RS256
//! JWT signed by the client's private key instead of a shared secret.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{now_secs, AuthError};

/// Assertion type sent alongside the assertion.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime of a client assertion.
pub const ASSERTION_LIFETIME_SECS: u64 = 1000;

const JTI_LEN: usize = 32;

/// Claims of a client assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    /// Issuer, the client id.
    pub iss: String,
    /// Subject, the client id.
    pub sub: String,
    /// Audience, the token endpoint.
    pub aud: String,
    /// Random unique id.
    pub jti: String,
    /// Issued at (Unix seconds).
    pub iat: u64,
    /// Expiration (Unix seconds).
    pub exp: u64,
}

/// Signs client assertions for one client and token endpoint.
pub struct ClientAssertionSigner {
    client_id: String,
    token_endpoint: String,
    key: EncodingKey,
}

impl ClientAssertionSigner {
    /// Creates a signer from an RSA private key in PEM form.
    ///
    /// PKCS#1 and PKCS#8 are accepted, either raw or base64 wrapped (as
    /// stored in single-line environment variables).
    pub fn from_pem(
        client_id: impl Into<String>,
        token_endpoint: impl Into<String>,
        private_key: &str,
    ) -> Result<Self, AuthError> {
        let pem = if private_key.contains("-----BEGIN") {
            private_key.as_bytes().to_vec()
        } else {
            let compact: String = private_key.split_whitespace().collect();
            STANDARD
                .decode(compact)
                .map_err(|e| AuthError::Configuration(format!("JWT_KEY is not PEM or base64: {e}")))?
        };

        let key = EncodingKey::from_rsa_pem(&pem)
            .map_err(|e| AuthError::Configuration(format!("invalid JWT_KEY: {e}")))?;

        Ok(Self {
            client_id: client_id.into(),
            token_endpoint: token_endpoint.into(),
            key,
        })
    }

    /// Builds and signs a fresh client assertion.
    pub fn generate_client_assertion(&self) -> Result<String, AuthError> {
        let now = now_secs();
        let claims = ClientAssertionClaims {
            iss: self.client_id.clone(),
            sub: self.client_id.clone(),
            aud: self.token_endpoint.clone(),
            jti: tdp_crypto::random::generate_alphanumeric(JTI_LEN),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AuthError::Configuration(format!("failed to sign client assertion: {e}")))
    }

    /// Form-urlencoded body for the authorization code grant.
    pub fn token_endpoint_parameters(&self, code: &str) -> Result<String, AuthError> {
        let assertion = self.generate_client_assertion()?;
        Ok(url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_assertion", &assertion)
            .append_pair("client_assertion_type", CLIENT_ASSERTION_TYPE)
            .append_pair("code", code)
            .append_pair("grant_type", "authorization_code")
            .finish())
    }
}
