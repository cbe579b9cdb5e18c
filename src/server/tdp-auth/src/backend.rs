//! Authentication backend trait.

use async_trait::async_trait;

use crate::{AuthContext, AuthError};

/// Trait for backends that map a verified username to a local user.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Resolves the username to an authentication context.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(AuthContext))` - The user exists
    /// * `Ok(None)` - No identity was presented, or the backend does not
    ///   treat an unknown user as an error
    /// * `Err(AuthError)` - Lookup failed
    async fn authenticate(&self, username: &str) -> Result<Option<AuthContext>, AuthError>;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &'static str;
}
