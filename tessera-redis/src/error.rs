//! Redis error types.

use thiserror::Error;

/// Result type for Redis operations.
pub type Result<T> = std::result::Result<T, RedisError>;

/// Errors raised while configuring, pooling or talking to Redis.
#[derive(Debug, Error)]
pub enum RedisError {
    /// Could not reach or handshake with the server.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Leasing a pooled connection failed or timed out.
    #[error("Pool error: {0}")]
    Pool(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A command exceeded the configured timeout.
    #[error("Operation timed out")]
    Timeout,

    /// Error reported by the client library or the server.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl<E> From<bb8::RunError<E>> for RedisError
where
    E: std::error::Error + 'static,
{
    fn from(err: bb8::RunError<E>) -> Self {
        match err {
            bb8::RunError::TimedOut => Self::Pool("timed out waiting for a connection".into()),
            bb8::RunError::User(e) => Self::Pool(e.to_string()),
        }
    }
}
