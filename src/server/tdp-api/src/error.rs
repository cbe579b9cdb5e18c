//! API error handling.
//!
//! Every error renders as JSON: `{"error": "..."}`, or a map of field
//! name to messages for validation failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tdp_auth::AuthError;
use tdp_users::{FieldErrors, UsersError};
use thiserror::Error;
use tracing::{error, warn};

/// Message returned when the authorization code cannot be exchanged.
pub const TOKEN_EXCHANGE_FAILED: &str =
    "Invalid Validation Code Or OpenID Connect Authenticator Down!";

/// Message returned for protected endpoints without credentials.
pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request.
    #[error("{0}")]
    BadRequest(String),

    /// Per-field validation failures.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Authentication was attempted and failed.
    #[error("{0}")]
    Unauthorized(String),

    /// No credentials, or not allowed to act on the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Unknown resource.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource kind.
        resource: &'static str,
        /// Requested id.
        id: String,
    },

    /// Unexpected server-side failure; details are logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Creates a not-found error.
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Creates a bad-request error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    /// Creates a forbidden error.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    /// Creates a single-field validation error.
    pub fn field(field: &str, msg: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, msg);
        ApiError::Validation(errors)
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Validation(errors) => serde_json::to_value(errors).unwrap_or_default(),
            ApiError::NotFound { .. } => serde_json::json!({"error": "Not found."}),
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                serde_json::json!({"error": "Internal server error"})
            },
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                serde_json::json!({ "error": msg })
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<UsersError> for ApiError {
    fn from(e: UsersError) -> Self {
        match e {
            UsersError::NotFound(what) => ApiError::not_found("record", what),
            UsersError::AlreadyExists(_) => {
                ApiError::field("username", "A user with that username already exists.")
            },
            UsersError::Validation(errors) => ApiError::Validation(errors),
            e @ UsersError::InvalidRole(_) => ApiError::field("requested_role", e.to_string()),
            e @ UsersError::NotEmpty => ApiError::BadRequest(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::TokenExchange(detail) => {
                warn!(error = %detail, "OIDC token exchange failed");
                ApiError::BadRequest(TOKEN_EXCHANGE_FAILED.into())
            },
            e @ AuthError::SessionStateMissing => ApiError::BadRequest(e.to_string()),
            e @ (AuthError::NoSuchUser
            | AuthError::StateMismatch
            | AuthError::StateExpired
            | AuthError::InvalidIdToken(_)
            | AuthError::Provider(_)) => {
                warn!(error = %e, "Authentication rejected");
                ApiError::Unauthorized(e.to_string())
            },
            e @ (AuthError::Configuration(_) | AuthError::Storage(_)) => {
                ApiError::Internal(e.to_string())
            },
        }
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
