//! Authentication context types.

use serde::{Deserialize, Serialize};
use tdp_users::User;

/// Method used to authenticate the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Identity verified by the OIDC provider during this request.
    Oidc,
    /// Session cookie bound to a user.
    Session,
    /// `X-Username` header (local development).
    Header,
}

/// Authenticated user context.
///
/// Passed to handlers after successful authentication.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The local user.
    pub user: User,

    /// Authentication method used.
    pub auth_method: AuthMethod,
}

impl AuthContext {
    /// Creates a context for a user.
    pub fn new(user: User, auth_method: AuthMethod) -> Self {
        Self { user, auth_method }
    }

    /// Whether the context belongs to the given user id.
    pub fn is_user(&self, id: uuid::Uuid) -> bool {
        self.user.id == id
    }
}
