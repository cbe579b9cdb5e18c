//! Users API handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tdp_users::{FieldErrors, NewUser, ProfileUpdate, Role, User};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User id.
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// Response to a successful create.
#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    /// User id.
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email.
    pub email: String,
}

/// Body of a create request.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Client-chosen id.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Login name.
    #[serde(default)]
    pub username: Option<String>,
    /// Plaintext password; hashed before storage.
    #[serde(default)]
    pub password: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
}

/// Body of a partial update.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    /// New given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// New family name.
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Response to a profile update.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Affiliated STT.
    pub stt: Option<i64>,
    /// Pending role request.
    pub requested_role: Option<Role>,
}

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    raw.parse().map_err(|_| ApiError::not_found("user", raw))
}

/// List users
///
/// GET /v1/users/
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.directory.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Create a user
///
/// POST /v1/users/
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut errors = FieldErrors::new();
    if body.username.is_none() {
        errors.add("username", "This field is required.");
    }
    if body.password.is_none() {
        errors.add("password", "This field is required.");
    }
    errors.into_result()?;

    let user = state
        .directory
        .create_user(NewUser {
            id: body.id,
            username: body.username.unwrap_or_default(),
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            role: None,
            stt_id: None,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        }),
    ))
}

/// Get a single user
///
/// GET /v1/users/{id}/
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let user = state
        .directory
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user", id))?;
    Ok(Json(user.into()))
}

/// Update the caller's own names
///
/// PATCH /v1/users/{id}/
pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id)?;
    if !user.is_user(id) {
        return Err(ApiError::forbidden(
            "You do not have permission to perform this action.",
        ));
    }

    let updated = state
        .directory
        .update_names(id, body.first_name, body.last_name)
        .await?;
    Ok(Json(updated.into()))
}

/// Set the caller's profile
///
/// POST /v1/users/set_profile/
pub async fn set_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<ProfileUpdate>,
) -> ApiResult<Json<ProfileResponse>> {
    let updated = state.directory.set_profile(user.user.id, &body).await?;
    Ok(Json(ProfileResponse {
        first_name: updated.first_name,
        last_name: updated.last_name,
        stt: updated.stt_id,
        requested_role: updated.requested_role,
    }))
}
