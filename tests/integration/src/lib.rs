//! Integration tests for the TDP API.
//!
//! Each test drives the full router in-process against a throwaway SQLite
//! database, with a mock server standing in for login.gov's token and JWKS
//! endpoints.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::collections::HashMap;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::Value;
use tdp_api::{ApiConfig, AppState};
use tdp_auth::{CookieConfig, OidcClient, OidcConfig, Session};
use tdp_storage_sqlite::SqliteBackend;
use tdp_users::{NewUser, User, UserDirectory};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// RSA key used both for client assertions and for signing mock ID tokens.
pub const TEST_KEY: &str = include_str!("../../fixtures/oidc_test_key.pem");
/// Client id registered with the mock provider.
pub const CLIENT_ID: &str = "urn:gov:gsa:openidconnect.profiles:sp:sso:hhs:tanf-proto-dev";
/// Issuer of mock ID tokens.
pub const ISSUER: &str = "https://idp.int.identitysandbox.gov/";
/// Key id published in the mock JWKS.
pub const KID: &str = "tdp-test-key";

// ============================================================================
// Test Responses
// ============================================================================

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Parsed `Location` header.
    pub fn location(&self) -> Option<Url> {
        self.headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Url::parse(v).ok())
    }

    /// Query parameters of the `Location` header.
    pub fn location_params(&self) -> HashMap<String, String> {
        self.location()
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default()
    }

    /// `name=value` pair of the session cookie, ready for a `Cookie` header.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

// ============================================================================
// Test App
// ============================================================================

/// The router, its state and a mock identity provider.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub provider: MockServer,
    _data_dir: TempDir,
}

impl TestApp {
    /// Starts an app with header authentication enabled.
    pub async fn start() -> Result<Self> {
        Self::start_with(true).await
    }

    /// Starts an app, choosing whether `X-Username` is honored.
    pub async fn start_with(header_auth: bool) -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        let backend = SqliteBackend::open(data_dir.path(), "tdp").await?;
        let directory = UserDirectory::new(backend).await?;

        let provider = MockServer::start().await;
        let oidc = OidcClient::new(
            OidcConfig {
                client_id: CLIENT_ID.into(),
                authorization_endpoint: format!("{}/openid_connect/authorize", provider.uri()),
                token_endpoint: format!("{}/api/openid_connect/token", provider.uri()),
                jwks_endpoint: format!("{}/api/openid_connect/certs", provider.uri()),
                issuer: ISSUER.into(),
                logout_endpoint: format!("{}/openid_connect/logout", provider.uri()),
                base_url: "http://localhost:8080/v1".into(),
            },
            TEST_KEY,
        )?;

        let config = ApiConfig {
            cookie: CookieConfig {
                secure: false,
                ..CookieConfig::default()
            },
            header_auth,
            frontend_origin: Some("http://localhost:3000".into()),
        };

        let state = AppState::new(directory, oidc, config);
        let router = tdp_api::router(state.clone());

        Ok(Self {
            state,
            router,
            provider,
            _data_dir: data_dir,
        })
    }

    /// The app's user directory.
    pub fn directory(&self) -> &UserDirectory {
        &self.state.directory
    }

    /// Sends a request through the router.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    /// GET with optional cookie.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Result<TestResponse> {
        match cookie {
            Some(cookie) => self.send(Method::GET, uri, &[(COOKIE.as_str(), cookie)], None).await,
            None => self.send(Method::GET, uri, &[], None).await,
        }
    }

    /// Creates a user directly in the directory.
    pub async fn create_user(&self, username: &str) -> Result<User> {
        Ok(self
            .directory()
            .create_user(NewUser {
                username: username.into(),
                email: format!("{username}@example.com"),
                password: Some("test_password".into()),
                ..Default::default()
            })
            .await?)
    }

    /// Stores a logged-in session for the user and returns its cookie pair.
    pub async fn login_session(&self, user_id: Uuid) -> Result<String> {
        let mut session = Session::anonymous();
        session.login(user_id, "seeded.id.token");
        let cookie = format!("sessionid={}", session.id);
        self.state.sessions.save(session).await?;
        Ok(cookie)
    }

    /// Mounts token and JWKS endpoints that hand out the given ID token.
    pub async fn mount_provider(&self, id_token: &str) {
        self.provider.reset().await;
        Mock::given(method("POST"))
            .and(path("/api/openid_connect/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access",
                "token_type": "Bearer",
                "expires_in": 3600,
                "id_token": id_token,
            })))
            .mount(&self.provider)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/openid_connect/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks()))
            .mount(&self.provider)
            .await;
    }

    /// Mounts a token endpoint that rejects every code.
    pub async fn mount_failing_provider(&self) {
        self.provider.reset().await;
        Mock::given(method("POST"))
            .and(path("/api/openid_connect/token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(&self.provider)
            .await;
    }

    /// Follows the login redirect, returning the session cookie and the
    /// issued state and nonce.
    pub async fn begin_login(&self) -> Result<(String, String, String)> {
        let response = self.get("/v1/login/oidc", None).await?;
        let cookie = response
            .session_cookie()
            .context("login redirect set no cookie")?;
        let params = response.location_params();
        let state = params.get("state").cloned().context("no state")?;
        let nonce = params.get("nonce").cloned().context("no nonce")?;
        Ok((cookie, state, nonce))
    }

    /// Runs a complete login for `email` and returns the callback response.
    pub async fn login(&self, email: &str) -> Result<TestResponse> {
        let (cookie, state, nonce) = self.begin_login().await?;
        self.mount_provider(&id_token(email, &nonce)).await;
        self.get(&format!("/v1/login?code=abc&state={state}"), Some(cookie.as_str()))
            .await
    }
}

/// JWKS publishing the test key.
pub fn jwks() -> Value {
    let key = RsaPrivateKey::from_pkcs1_pem(TEST_KEY).unwrap();
    serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "kid": KID,
            "use": "sig",
            "alg": "RS256",
            "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        }]
    })
}

/// An ID token as login.gov would issue it.
pub fn id_token(email: &str, nonce: &str) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = serde_json::json!({
        "sub": Uuid::new_v4().to_string(),
        "email": email,
        "email_verified": true,
        "nonce": nonce,
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "acr": "http://idmanagement.gov/ns/assurance/ial/1",
        "iat": now,
        "exp": now + 900,
    });
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.into());
    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(TEST_KEY.as_bytes()).unwrap(),
    )
    .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tdp_users::populate::{populate_stts, OFA_REGION_ID, OFA_STT_NAME};
    use tdp_users::Role;

    fn username_header(username: &str) -> [(&'static str, &str); 1] {
        [(tdp_auth::USERNAME_HEADER, username)]
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::start().await.unwrap();

        let response = app.get("/v1/health", None).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["status"], "ok");
        assert!(response.body["version"].is_string());
    }

    // ------------------------------------------------------------------
    // OIDC login
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_redirect() {
        let app = TestApp::start().await.unwrap();

        let response = app.get("/v1/login/oidc", None).await.unwrap();
        assert_eq!(response.status, StatusCode::FOUND);

        let location = response.location().unwrap();
        assert!(location
            .as_str()
            .starts_with(&format!("{}/openid_connect/authorize", app.provider.uri())));

        let params = response.location_params();
        assert_eq!(params["client_id"], CLIENT_ID);
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid email");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/v1/login");
        assert_eq!(params["state"].len(), 64);

        let cookie = response.session_cookie().unwrap();
        let session_id = cookie.trim_start_matches("sessionid=");
        let session = app.state.sessions.get(session_id).await.unwrap();
        let tracker = session.state_nonce.unwrap();
        assert_eq!(tracker.state, params["state"]);
        assert_eq!(tracker.nonce, params["nonce"]);
        assert!(session.user_id.is_none());
    }

    #[tokio::test]
    async fn test_login_redirect_reuses_session() {
        let app = TestApp::start().await.unwrap();
        let (cookie, first_state, _) = app.begin_login().await.unwrap();

        let response = app.get("/v1/login/oidc", Some(cookie.as_str())).await.unwrap();
        assert_eq!(response.session_cookie(), Some(cookie));
        assert_ne!(response.location_params()["state"], first_state);
    }

    #[tokio::test]
    async fn test_callback_missing_code() {
        let app = TestApp::start().await.unwrap();

        let response = app.get("/v1/login?state=dummy", None).await.unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, serde_json::json!({"error": "OIDC Code not found!"}));
    }

    #[tokio::test]
    async fn test_callback_missing_state() {
        let app = TestApp::start().await.unwrap();

        let response = app.get("/v1/login?code=dummy", None).await.unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, serde_json::json!({"error": "OIDC State not found"}));
    }

    #[tokio::test]
    async fn test_callback_without_session_state() {
        let app = TestApp::start().await.unwrap();

        let response = app.get("/v1/login?code=abc&state=xyz", None).await.unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "OIDC session state not found");
    }

    #[tokio::test]
    async fn test_callback_bad_code() {
        let app = TestApp::start().await.unwrap();
        let (cookie, state, _) = app.begin_login().await.unwrap();
        app.mount_failing_provider().await;

        let response = app
            .get(&format!("/v1/login?code=bad&state={state}"), Some(cookie.as_str()))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body["error"],
            "Invalid Validation Code Or OpenID Connect Authenticator Down!"
        );
    }

    #[tokio::test]
    async fn test_login_creates_then_finds_user() {
        let app = TestApp::start().await.unwrap();

        let response = app.login("test@example.com").await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["status"], "User Created");
        assert_eq!(response.body["email"], "test@example.com");

        let user = app
            .directory()
            .find_by_username("test@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.body["user_id"], user.id.to_string());
        assert!(!user.has_usable_password());

        let response = app.login("test@example.com").await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["status"], "User Found");
        assert_eq!(response.body["user_id"], user.id.to_string());
        assert_eq!(app.directory().count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_login_rotates_session() {
        let app = TestApp::start().await.unwrap();
        let (cookie, state, nonce) = app.begin_login().await.unwrap();
        app.mount_provider(&id_token("jane@example.com", &nonce)).await;

        let response = app
            .get(&format!("/v1/login?code=abc&state={state}"), Some(cookie.as_str()))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let new_cookie = response.session_cookie().unwrap();
        assert_ne!(new_cookie, cookie);
        let old_id = cookie.trim_start_matches("sessionid=");
        assert!(app.state.sessions.get(old_id).await.is_none());

        let session = app
            .state
            .sessions
            .get(new_cookie.trim_start_matches("sessionid="))
            .await
            .unwrap();
        assert!(session.is_authenticated());
        assert!(session.token.is_some());
        assert!(session.state_nonce.is_none());

        let response = app.get("/v1/stts/all", Some(new_cookie.as_str())).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_nonce_mismatch_rejected() {
        let app = TestApp::start().await.unwrap();
        let (cookie, state, _) = app.begin_login().await.unwrap();
        app.mount_provider(&id_token("jane@example.com", "forged-nonce"))
            .await;

        let uri = format!("/v1/login?code=abc&state={state}");
        let response = app.get(&uri, Some(cookie.as_str())).await.unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body["error"], "Could not validate nonce and state");
        assert_eq!(app.directory().count_users().await.unwrap(), 0);

        // The tracker is consumed by the failed attempt.
        let response = app.get(&uri, Some(cookie.as_str())).await.unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "OIDC session state not found");
    }

    #[tokio::test]
    async fn test_state_mismatch_rejected() {
        let app = TestApp::start().await.unwrap();
        let (cookie, _, nonce) = app.begin_login().await.unwrap();
        app.mount_provider(&id_token("jane@example.com", &nonce)).await;

        let response = app
            .get("/v1/login?code=abc&state=forged", Some(cookie.as_str()))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    // ------------------------------------------------------------------
    // Logout
    // ------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callbacks_consume_tracker_once() {
        let app = TestApp::start().await.unwrap();
        let (cookie, state, nonce) = app.begin_login().await.unwrap();
        app.mount_provider(&id_token("jane@example.com", &nonce)).await;

        let uri = format!("/v1/login?code=abc&state={state}");
        let (first, second) = tokio::join!(
            app.get(&uri, Some(cookie.as_str())),
            app.get(&uri, Some(cookie.as_str())),
        );

        let mut statuses = vec![first.unwrap().status, second.unwrap().status];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::BAD_REQUEST]);
        assert_eq!(app.directory().count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_login_reports_verified_email() {
        let app = TestApp::start().await.unwrap();
        let existing = app
            .directory()
            .create_user(NewUser {
                username: "found@example.com".into(),
                email: String::new(),
                ..Default::default()
            })
            .await
            .unwrap();

        let response = app.login("found@example.com").await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["status"], "User Found");
        assert_eq!(response.body["user_id"], existing.id.to_string());
        assert_eq!(response.body["email"], "found@example.com");
    }

    #[tokio::test]
    async fn test_logout_redirect_clears_token() {
        let app = TestApp::start().await.unwrap();
        let login = app.login("jane@example.com").await.unwrap();
        let cookie = login.session_cookie().unwrap();
        let session_id = cookie.trim_start_matches("sessionid=").to_string();
        let token = app
            .state
            .sessions
            .get(&session_id)
            .await
            .unwrap()
            .token
            .unwrap();

        let response = app.get("/v1/logout/oidc", Some(cookie.as_str())).await.unwrap();
        assert_eq!(response.status, StatusCode::FOUND);

        let params = response.location_params();
        assert_eq!(params["id_token_hint"], token);
        assert_eq!(
            params["post_logout_redirect_uri"],
            "http://localhost:8080/v1/logout"
        );
        assert!(!params["state"].is_empty());

        let session = app.state.sessions.get(&session_id).await.unwrap();
        assert!(session.token.is_none());
    }

    #[tokio::test]
    async fn test_logout_redirect_without_session() {
        let app = TestApp::start().await.unwrap();

        let response = app.get("/v1/logout/oidc", None).await.unwrap();
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.location_params()["id_token_hint"], "");
    }

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let app = TestApp::start().await.unwrap();
        let user = app.create_user("jsmith").await.unwrap();
        let cookie = app.login_session(user.id).await.unwrap();

        let response = app.get("/v1/logout", Some(cookie.as_str())).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, serde_json::json!({"system": "User logged out"}));
        assert!(response
            .headers
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));

        let response = app.get("/v1/stts/all", Some(cookie.as_str())).await.unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_user() {
        let app = TestApp::start().await.unwrap();

        let response = app
            .send(
                Method::POST,
                "/v1/users/",
                &[],
                Some(serde_json::json!({
                    "username": "test__user",
                    "password": "test_password",
                    "first_name": "Jane",
                    "last_name": "Doe",
                    "email": "jane@example.com",
                })),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body["username"], "test__user");
        assert_eq!(response.body["email"], "jane@example.com");
        assert!(response.body.get("password").is_none());

        let user = app
            .directory()
            .find_by_username("test__user")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(user.password_hash.as_deref(), Some("test_password"));
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let app = TestApp::start().await.unwrap();
        app.create_user("jsmith").await.unwrap();

        let response = app
            .send(
                Method::POST,
                "/v1/users/",
                &[],
                Some(serde_json::json!({"username": "jsmith", "password": "pw"})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(response.body["username"].is_array());

        let response = app
            .send(
                Method::POST,
                "/v1/users/",
                &[],
                Some(serde_json::json!({"username": "someone"})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["password"][0], "This field is required.");
    }

    #[tokio::test]
    async fn test_retrieve_and_list_users() {
        let app = TestApp::start().await.unwrap();
        let user = app.create_user("jsmith").await.unwrap();
        app.create_user("adoe").await.unwrap();

        let response = app
            .get(&format!("/v1/users/{}/", user.id), None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["username"], "jsmith");

        let response = app.get("/v1/users/", None).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_array().map(Vec::len), Some(2));
        assert_eq!(response.body[0]["username"], "adoe");

        let response = app
            .get(&format!("/v1/users/{}/", Uuid::new_v4()), None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        let response = app.get("/v1/users/not-a-uuid/", None).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_can_update_own_user() {
        let app = TestApp::start().await.unwrap();
        let user = app.create_user("jsmith").await.unwrap();

        let response = app
            .send(
                Method::PATCH,
                &format!("/v1/users/{}/", user.id),
                &username_header("jsmith"),
                Some(serde_json::json!({"first_name": "Jane"})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["first_name"], "Jane");

        let stored = app.directory().get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Jane");
    }

    #[tokio::test]
    async fn test_cannot_update_user_anonymously() {
        let app = TestApp::start().await.unwrap();
        let user = app.create_user("jsmith").await.unwrap();

        let response = app
            .send(
                Method::PATCH,
                &format!("/v1/users/{}/", user.id),
                &[],
                Some(serde_json::json!({"first_name": "Jane"})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cannot_update_other_user() {
        let app = TestApp::start().await.unwrap();
        let user = app.create_user("jsmith").await.unwrap();
        app.create_user("adoe").await.unwrap();

        let response = app
            .send(
                Method::PATCH,
                &format!("/v1/users/{}/", user.id),
                &username_header("adoe"),
                Some(serde_json::json!({"first_name": "Jane"})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    // ------------------------------------------------------------------
    // Authentication lookup
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_header_auth_unknown_user() {
        let app = TestApp::start().await.unwrap();

        let response = app
            .send(Method::GET, "/v1/stts/all", &username_header("nobody"), None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body["error"], "No such user");
    }

    #[tokio::test]
    async fn test_header_auth_disabled() {
        let app = TestApp::start_with(false).await.unwrap();
        app.create_user("jsmith").await.unwrap();

        let response = app
            .send(Method::GET, "/v1/stts/all", &username_header("jsmith"), None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_set_profile_data() {
        for role in Role::ALL {
            let app = TestApp::start().await.unwrap();
            populate_stts(app.directory()).await.unwrap();
            let user = app.create_user("jsmith").await.unwrap();
            let cookie = app.login_session(user.id).await.unwrap();
            let stt_id = app.directory().list_stts().await.unwrap()[0].id;

            let response = app
                .send(
                    Method::POST,
                    "/v1/users/set_profile/",
                    &[(COOKIE.as_str(), cookie.as_str())],
                    Some(serde_json::json!({
                        "first_name": "Joe",
                        "last_name": "Bloggs",
                        "stt": stt_id,
                        "requested_role": role.as_str(),
                    })),
                )
                .await
                .unwrap();
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(
                response.body,
                serde_json::json!({
                    "first_name": "Joe",
                    "last_name": "Bloggs",
                    "stt": stt_id,
                    "requested_role": role.as_str(),
                })
            );

            let stored = app.directory().get_user(user.id).await.unwrap().unwrap();
            assert_eq!(stored.requested_role, Some(role));
            assert_eq!(stored.stt_id, Some(stt_id));
            assert_eq!(stored.role, None);
        }
    }

    #[tokio::test]
    async fn test_set_profile_data_anonymous() {
        let app = TestApp::start().await.unwrap();

        let response = app
            .send(
                Method::POST,
                "/v1/users/set_profile/",
                &[],
                Some(serde_json::json!({"first_name": "Joe", "requested_role": "OFA Admin"})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_set_profile_bad_role() {
        let app = TestApp::start().await.unwrap();
        app.create_user("jsmith").await.unwrap();

        let response = app
            .send(
                Method::POST,
                "/v1/users/set_profile/",
                &username_header("jsmith"),
                Some(serde_json::json!({
                    "first_name": "Joe",
                    "last_name": "Bloggs",
                    "requested_role": "foo",
                })),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body["requested_role"][0],
            "\"foo\" is not a valid choice."
        );
    }

    #[tokio::test]
    async fn test_set_profile_with_only_name() {
        let app = TestApp::start().await.unwrap();
        app.create_user("jsmith").await.unwrap();

        let response = app
            .send(
                Method::POST,
                "/v1/users/set_profile/",
                &username_header("jsmith"),
                Some(serde_json::json!({"first_name": "Joe", "last_name": "Bloggs"})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.body,
            serde_json::json!({
                "first_name": "Joe",
                "last_name": "Bloggs",
                "stt": null,
                "requested_role": null,
            })
        );
    }

    #[tokio::test]
    async fn test_set_profile_fields_are_write_once() {
        let app = TestApp::start().await.unwrap();
        populate_stts(app.directory()).await.unwrap();
        app.create_user("jsmith").await.unwrap();
        let stts = app.directory().list_stts().await.unwrap();

        let first = serde_json::json!({
            "first_name": "Joe",
            "last_name": "Bloggs",
            "stt": stts[0].id,
            "requested_role": "Data Prepper",
        });
        let response = app
            .send(
                Method::POST,
                "/v1/users/set_profile/",
                &username_header("jsmith"),
                Some(first),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let second = serde_json::json!({
            "first_name": "Joe",
            "last_name": "Bloggs",
            "stt": stts[1].id,
            "requested_role": "OFA Admin",
        });
        let response = app
            .send(
                Method::POST,
                "/v1/users/set_profile/",
                &username_header("jsmith"),
                Some(second),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body["requested_role"][0],
            "Cannot modify requested role after it is set."
        );
        assert_eq!(response.body["stt"][0], "Cannot modify STT after it is set.");
    }

    #[tokio::test]
    async fn test_set_profile_unknown_stt() {
        let app = TestApp::start().await.unwrap();
        app.create_user("jsmith").await.unwrap();

        let response = app
            .send(
                Method::POST,
                "/v1/users/set_profile/",
                &username_header("jsmith"),
                Some(serde_json::json!({"stt": 4242})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body["stt"][0],
            "Invalid pk \"4242\" - object does not exist."
        );
    }

    // ------------------------------------------------------------------
    // STTs
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_stts() {
        let app = TestApp::start().await.unwrap();
        populate_stts(app.directory()).await.unwrap();
        let user = app.create_user("jsmith").await.unwrap();
        let cookie = app.login_session(user.id).await.unwrap();

        let response = app.get("/v1/stts/all", Some(cookie.as_str())).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let regions = response.body.as_array().unwrap();
        assert_eq!(regions[0]["id"], 1);
        assert_eq!(regions[0]["stts"][0]["name"], "Connecticut");
        let last = regions.last().unwrap();
        assert_eq!(last["id"], OFA_REGION_ID);
        assert_eq!(last["stts"][0]["name"], OFA_STT_NAME);

        let tribe = regions
            .iter()
            .flat_map(|r| r["stts"].as_array().unwrap())
            .find(|s| s["type"] == "tribe")
            .unwrap();
        assert!(tribe["code"].is_string());
    }

    #[tokio::test]
    async fn test_get_stts_anonymous() {
        let app = TestApp::start().await.unwrap();

        let response = app.get("/v1/stts/all", None).await.unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }
}
