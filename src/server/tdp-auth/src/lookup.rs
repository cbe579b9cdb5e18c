//! Username lookup backends.
//!
//! [`UsernameLookup`] maps an identity the provider has already verified
//! to a local user and reports "no identity" for unknown usernames.
//! [`HeaderAuthentication`] trusts the `X-Username` request header and is
//! only wired up for local development; there an unknown username is a
//! hard failure.

use async_trait::async_trait;
use tdp_users::{NewUser, User, UserDirectory, UsersError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{AuthBackend, AuthContext, AuthError, AuthMethod};

/// Request header read by [`HeaderAuthentication`].
pub const USERNAME_HEADER: &str = "X-Username";

/// Looks users up by username in the directory.
#[derive(Clone)]
pub struct UsernameLookup {
    directory: UserDirectory,
}

impl UsernameLookup {
    /// Creates a lookup over the given directory.
    pub fn new(directory: UserDirectory) -> Self {
        Self { directory }
    }

    /// Returns the user with the given id, if any.
    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.directory.get_user(id).await?)
    }

    /// Returns the user for a verified username, creating it when absent.
    ///
    /// The boolean is `true` when the user was created by this call. New
    /// users get the username as their email and no usable password.
    pub async fn find_or_create(&self, username: &str) -> Result<(User, bool), AuthError> {
        if let Some(ctx) = self.authenticate(username).await? {
            return Ok((ctx.user, false));
        }

        match self
            .directory
            .create_user(NewUser::with_username(username))
            .await
        {
            Ok(user) => Ok((user, true)),
            // Lost a race with a concurrent first login.
            Err(UsersError::AlreadyExists(_)) => self
                .directory
                .find_by_username(username)
                .await?
                .map(|user| (user, false))
                .ok_or(AuthError::NoSuchUser),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AuthBackend for UsernameLookup {
    async fn authenticate(&self, username: &str) -> Result<Option<AuthContext>, AuthError> {
        let user = self.directory.find_by_username(username).await?;
        if user.is_none() {
            debug!(username = %username, "No local user for verified identity");
        }
        Ok(user.map(|user| AuthContext::new(user, AuthMethod::Oidc)))
    }

    fn name(&self) -> &'static str {
        "username"
    }
}

/// Trusts the `X-Username` header.
#[derive(Clone)]
pub struct HeaderAuthentication {
    directory: UserDirectory,
}

impl HeaderAuthentication {
    /// Creates the header backend over the given directory.
    pub fn new(directory: UserDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl AuthBackend for HeaderAuthentication {
    async fn authenticate(&self, username: &str) -> Result<Option<AuthContext>, AuthError> {
        if username.is_empty() {
            return Ok(None);
        }

        match self.directory.find_by_username(username).await? {
            Some(user) => Ok(Some(AuthContext::new(user, AuthMethod::Header))),
            None => {
                warn!(username = %username, "Header authentication for unknown user");
                Err(AuthError::NoSuchUser)
            },
        }
    }

    fn name(&self) -> &'static str {
        "header"
    }
}
