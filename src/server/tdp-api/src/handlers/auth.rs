//! Login and logout handlers.

use axum::extract::{Query, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tdp_auth::{AuthError, Session, StateNonceTracker, UsernameLookup};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extractors::MaybeSession;
use crate::state::AppState;

fn found(location: &str, cookie: Option<String>) -> Response {
    match cookie {
        Some(cookie) => (
            StatusCode::FOUND,
            [(LOCATION, location.to_string()), (SET_COOKIE, cookie)],
        )
            .into_response(),
        None => (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response(),
    }
}

/// Redirect to the provider's authorization endpoint.
///
/// GET /v1/login/oidc
pub async fn login_redirect(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> ApiResult<Response> {
    let mut session = session.unwrap_or_else(Session::anonymous);
    let tracker = StateNonceTracker::generate();
    let url = state.oidc.config().authorization_url(&tracker)?;

    session.state_nonce = Some(tracker);
    let cookie = state.config.cookie.session_cookie(&session.id);
    state.sessions.save(session).await?;

    Ok(found(url.as_str(), Some(cookie)))
}

/// Query parameters of the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// State echoed by the provider.
    pub state: Option<String>,
}

/// Body of a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Local user id.
    pub user_id: Uuid,
    /// Verified email address.
    pub email: String,
    /// `User Found` or `User Created`.
    pub status: &'static str,
}

/// Provider callback: verify the login and bind the session to the user.
///
/// GET /v1/login?code&state
pub async fn login_callback(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Response> {
    let code = params
        .code
        .ok_or_else(|| ApiError::bad_request("OIDC Code not found!"))?;
    let returned_state = params
        .state
        .ok_or_else(|| ApiError::bad_request("OIDC State not found"))?;

    let mut session = session.ok_or(AuthError::SessionStateMissing)?;
    let tracker = state
        .sessions
        .take_state_nonce(&session.id)
        .await
        .ok_or(AuthError::SessionStateMissing)?;
    session.state_nonce = None;

    let login = state
        .oidc
        .complete_login(&code, &returned_state, &tracker)
        .await?;

    let lookup = UsernameLookup::new(state.directory.clone());
    let (user, created) = lookup.find_or_create(&login.email).await?;
    let status = if created { "User Created" } else { "User Found" };

    let previous = session.login(user.id, login.id_token);
    state.sessions.delete(&previous).await?;
    let cookie = state.config.cookie.session_cookie(&session.id);
    state.sessions.save(session).await?;

    info!(user_id = %user.id, status, "OIDC login");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            user_id: user.id,
            email: login.email,
            status,
        }),
    )
        .into_response())
}

/// Drop the stored ID token and redirect to the provider's logout.
///
/// GET /v1/logout/oidc
pub async fn logout_redirect(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> ApiResult<Response> {
    let token = match session {
        Some(mut session) => {
            let token = session.token.take();
            state.sessions.save(session).await?;
            token
        },
        None => None,
    };

    let url = state.oidc.config().logout_url(token.as_deref())?;
    Ok(found(url.as_str(), None))
}

/// Destroy the local session.
///
/// GET /v1/logout
pub async fn logout(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> ApiResult<Response> {
    if let Some(session) = session {
        state.sessions.delete(&session.id).await?;
        if let Some(user_id) = session.user_id {
            info!(user_id = %user_id, "User logged out");
        }
    }

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, state.config.cookie.clear_cookie())],
        Json(serde_json::json!({"system": "User logged out"})),
    )
        .into_response())
}
