//! Login on top of session claims.
//!
//! Credentials are checked against a [`UserDirectory`]; a successful login
//! claims the request's session for the user.

use crate::backend::SessionBackend;
use crate::error::{BoxError, SessionError};
use crate::handle::SessionHandle;
use async_trait::async_trait;
use http::StatusCode;
use thiserror::Error;
use tracing::{info, warn};

/// Where user accounts live.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether `password` is right for an enabled account called `user`.
    async fn can_login(&self, user: &str, password: &str) -> Result<bool, BoxError>;

    /// Whether `user` may use the admin area.
    async fn is_admin(&self, user: &str) -> Result<bool, BoxError>;
}

/// Login and access-check failures.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid user name or password")]
    InvalidCredentials,

    #[error("user is not an administrator")]
    NotAdmin,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("user directory unavailable: {0}")]
    Directory(#[source] BoxError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl LoginError {
    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::NotLoggedIn => StatusCode::UNAUTHORIZED,
            Self::NotAdmin => StatusCode::FORBIDDEN,
            Self::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Session(e) => e.status_code(),
        }
    }
}

/// Check credentials and claim the session for `user`.
///
/// Only administrators may log in. The session must still exist; a session
/// that already belongs to someone is reported as
/// [`SessionError::SessionHasUser`].
pub async fn log_in<B: SessionBackend>(
    handle: &mut SessionHandle<B>,
    directory: &dyn UserDirectory,
    user: &str,
    password: &str,
) -> Result<(), LoginError> {
    if !directory
        .can_login(user, password)
        .await
        .map_err(LoginError::Directory)?
    {
        warn!(user = %user, "Rejected login");
        return Err(LoginError::InvalidCredentials);
    }
    if !directory
        .is_admin(user)
        .await
        .map_err(LoginError::Directory)?
    {
        warn!(user = %user, "Rejected login for non-admin user");
        return Err(LoginError::NotAdmin);
    }
    if !handle.has_session().await? {
        return Err(SessionError::SessionNotExist.into());
    }

    handle.log_in(user).await?;
    info!(user = %user, "User logged in");
    Ok(())
}

/// The logged-in administrator for this session.
pub async fn require_admin<B: SessionBackend>(
    handle: &mut SessionHandle<B>,
    directory: &dyn UserDirectory,
) -> Result<String, LoginError> {
    let Some(user) = handle.is_logged_in().await? else {
        return Err(LoginError::NotLoggedIn);
    };
    if !directory
        .is_admin(&user)
        .await
        .map_err(LoginError::Directory)?
    {
        return Err(LoginError::NotAdmin);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::SessionConfig;
    use crate::request::RequestMeta;
    use crate::store::SessionStore;
    use std::collections::HashMap;

    struct Accounts(HashMap<&'static str, (&'static str, bool)>);

    impl Accounts {
        fn new() -> Self {
            Self(HashMap::from([
                ("alice", ("secret", true)),
                ("bob", ("hunter2", false)),
            ]))
        }
    }

    #[async_trait]
    impl UserDirectory for Accounts {
        async fn can_login(&self, user: &str, password: &str) -> Result<bool, BoxError> {
            Ok(self.0.get(user).is_some_and(|(pw, _)| *pw == password))
        }

        async fn is_admin(&self, user: &str) -> Result<bool, BoxError> {
            Ok(self.0.get(user).is_some_and(|(_, admin)| *admin))
        }
    }

    async fn handle() -> SessionHandle<MemoryBackend> {
        let store = SessionStore::new(MemoryBackend::new(), SessionConfig::default()).unwrap();
        store.open(&RequestMeta::new("1.2.3.4", "/login")).await.unwrap()
    }

    #[tokio::test]
    async fn test_admin_login() {
        let accounts = Accounts::new();
        let mut handle = handle().await;

        log_in(&mut handle, &accounts, "alice", "secret").await.unwrap();
        assert_eq!(require_admin(&mut handle, &accounts).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_rejections() {
        let accounts = Accounts::new();
        let mut handle = handle().await;

        let err = log_in(&mut handle, &accounts, "alice", "wrong").await.unwrap_err();
        assert!(matches!(err, LoginError::InvalidCredentials));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = log_in(&mut handle, &accounts, "bob", "hunter2").await.unwrap_err();
        assert!(matches!(err, LoginError::NotAdmin));

        let err = require_admin(&mut handle, &accounts).await.unwrap_err();
        assert!(matches!(err, LoginError::NotLoggedIn));
        assert_eq!(handle.is_logged_in().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_login_conflicts() {
        let accounts = Accounts::new();
        let mut handle = handle().await;
        log_in(&mut handle, &accounts, "alice", "secret").await.unwrap();

        let err = log_in(&mut handle, &accounts, "alice", "secret").await.unwrap_err();
        assert!(matches!(err, LoginError::Session(SessionError::SessionHasUser)));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_login_after_logout() {
        let accounts = Accounts::new();
        let mut handle = handle().await;
        handle.log_out().await.unwrap();

        let err = log_in(&mut handle, &accounts, "alice", "secret").await.unwrap_err();
        assert!(matches!(err, LoginError::Session(SessionError::SessionNotExist)));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
