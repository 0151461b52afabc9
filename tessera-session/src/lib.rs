//! Cookie-bound sessions with atomic login claims.
//!
//! A session is a small record in a key-value backend: who the visitor is
//! (once logged in), where they came from, and the last page they saw. The
//! browser only ever holds the opaque key, in a cookie.
//!
//! # Guarantees
//!
//! - Keys carry at least 16 bytes from the OS random source; key generation
//!   fails rather than fall back to a weaker source.
//! - A record is created together with its expiry in one atomic batch, so a
//!   session never exists without a lifetime.
//! - A session is claimed by at most one user, even under concurrent logins.
//!   The claim is a backend-side compare-and-set.
//! - Writes to an existing session never resurrect one that has expired.
//!
//! # Features
//!
//! - `redis` - Redis backend (enabled by default)
//!
//! Without it only [`MemoryBackend`] is available.
//!
//! # Examples
//!
//! ## Request flow
//!
//! ```
//! use tessera_session::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), SessionError> {
//! let store = SessionStore::new(MemoryBackend::new(), SessionConfig::default())?;
//!
//! // First visit: no cookie, so a session is minted.
//! let request = RequestMeta::new("1.2.3.4", "/home").with_user_agent("test-agent");
//! let mut session = store.open(&request).await?;
//! assert!(session.is_new());
//! let cookie = session.take_cookie().unwrap();
//!
//! // Login claims the session exactly once.
//! session.claim_user("alice").await?;
//! assert!(matches!(
//!     session.claim_user("bob").await,
//!     Err(SessionError::SessionHasUser)
//! ));
//! session.close();
//!
//! // Next visit: the cookie brings the same session back.
//! let request = RequestMeta::new("1.2.3.4", "/admin").with_cookie(&cookie.name, &cookie.value);
//! let mut session = store.open(&request).await?;
//! assert_eq!(session.is_logged_in().await?, Some("alice".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Redis backend
//!
//! ```no_run
//! # #[cfg(feature = "redis")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use tessera_session::*;
//! use tessera_redis::RedisConfig;
//!
//! let backend = RedisBackend::connect(RedisConfig::from_env().build()).await?;
//! let store = SessionStore::new(backend, SessionConfig::from_env()?)?;
//! let middleware = SessionMiddleware::new(store);
//! # Ok(())
//! # }
//! ```

pub mod auth;
mod backend;
mod config;
mod cookie;
mod error;
mod handle;
mod key;
mod middleware;
mod record;
mod request;
mod store;
mod sweeper;
pub mod visit;

pub use backend::{BackendConnection, FieldWrite, MemoryBackend, MemoryConnection, SessionBackend};
#[cfg(feature = "redis")]
pub use backend::{RedisBackend, RedisBackendConnection};
pub use config::{DEFAULT_COOKIE_NAME, MAX_RANDOM_BYTES, MIN_RANDOM_BYTES, SessionConfig};
pub use cookie::{Cookies, SessionCookie};
pub use error::{BoxError, SessionError, SessionResult};
pub use handle::SessionHandle;
pub use key::{KeyGenerator, KeySource, MAX_KEY_LEN, SessionKey};
pub use middleware::SessionMiddleware;
pub use record::{KeyTtl, NewSession, Session, fields};
pub use request::RequestMeta;
pub use store::SessionStore;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::auth::{LoginError, UserDirectory};
    pub use crate::config::SessionConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::handle::SessionHandle;
    pub use crate::key::SessionKey;
    pub use crate::middleware::SessionMiddleware;
    pub use crate::record::{NewSession, Session};
    pub use crate::request::RequestMeta;
    pub use crate::store::SessionStore;
    pub use crate::visit::{Visit, VisitSink};
    pub use crate::{MemoryBackend, SessionBackend};

    #[cfg(feature = "redis")]
    pub use crate::RedisBackend;
}
