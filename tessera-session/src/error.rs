//! Error types for session operations.

use http::StatusCode;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Boxed transport error carried by [`SessionError::BackendUnavailable`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The random source could not supply enough bytes for a key.
    #[error("unable to read enough entropy: {0}")]
    Entropy(String),

    /// A freshly generated key is already present in the backend.
    #[error("session already exists")]
    SessionExists,

    /// The key is unknown to the backend or its lifetime has run out.
    #[error("session does not exist")]
    SessionNotExist,

    /// The session has already been claimed by a user.
    #[error("session already has a user")]
    SessionHasUser,

    /// A claim was attempted with an empty user name.
    #[error("user name must not be empty")]
    EmptyUser,

    /// The backend could not be reached or answered with a protocol error.
    #[error("session backend unavailable: {0}")]
    BackendUnavailable(#[source] BoxError),

    /// A stored record could not be decoded.
    #[error("malformed session record: {0}")]
    Malformed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Wrap any transport failure as [`SessionError::BackendUnavailable`].
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Self::BackendUnavailable(err.into())
    }

    /// Whether the caller should simply try again with a new key.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionExists)
    }

    /// Whether the failure is the client's to fix rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotExist | Self::SessionHasUser | Self::EmptyUser
        )
    }

    /// HTTP status a transport layer should answer with.
    ///
    /// A missing session during login asks the client to log in again, a
    /// duplicate claim is a conflict, everything else is a server fault.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionNotExist => StatusCode::UNAUTHORIZED,
            Self::SessionHasUser => StatusCode::CONFLICT,
            Self::EmptyUser => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        Self::backend(err)
    }
}

#[cfg(feature = "redis")]
impl From<tessera_redis::RedisError> for SessionError {
    fn from(err: tessera_redis::RedisError) -> Self {
        match err {
            tessera_redis::RedisError::Config(msg) => Self::Config(msg),
            other => Self::backend(other),
        }
    }
}
