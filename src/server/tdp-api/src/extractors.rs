//! Axum extractors for API handlers.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use tdp_auth::{
    AuthBackend, AuthContext, AuthMethod, HeaderAuthentication, Session, UsernameLookup,
    USERNAME_HEADER,
};

use crate::error::{ApiError, NOT_AUTHENTICATED};
use crate::state::AppState;

async fn load_session(parts: &Parts, state: &AppState) -> Option<Session> {
    let id = parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| state.config.cookie.extract(header))?;

    state.sessions.get(id).await
}

/// The caller's session, if the cookie names a live one.
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(load_session(parts, state).await))
    }
}

/// Authenticated user extractor.
///
/// Tries the `X-Username` header when header authentication is enabled,
/// then the session cookie. Rejects with 403 when neither identifies a
/// user.
pub struct CurrentUser(pub AuthContext);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.config.header_auth {
            let username = parts
                .headers
                .get(USERNAME_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            let backend = HeaderAuthentication::new(state.directory.clone());
            if let Some(ctx) = backend.authenticate(username).await? {
                return Ok(CurrentUser(ctx));
            }
        }

        if let Some(user_id) = load_session(parts, state).await.and_then(|s| s.user_id) {
            let lookup = UsernameLookup::new(state.directory.clone());
            if let Some(user) = lookup.get_user(user_id).await? {
                return Ok(CurrentUser(AuthContext::new(user, AuthMethod::Session)));
            }
        }

        Err(ApiError::forbidden(NOT_AUTHENTICATED))
    }
}

impl std::ops::Deref for CurrentUser {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
