//! The session store: key minting, claims, reads and the cookie protocol.

use crate::backend::{BackendConnection, FieldWrite, SessionBackend};
use crate::config::SessionConfig;
use crate::cookie::SessionCookie;
use crate::error::{SessionError, SessionResult};
use crate::handle::SessionHandle;
use crate::key::{KeyGenerator, KeySource, SessionKey};
use crate::record::{NewSession, Session, fields};
use crate::request::RequestMeta;
use crate::sweeper;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the mapping from cookie keys to backend session records.
///
/// Cloning is cheap and every clone drives the same backend, so construct
/// one store at startup and pass it to whatever needs sessions.
///
/// # Examples
///
/// ```
/// use tessera_session::{MemoryBackend, NewSession, SessionConfig, SessionStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tessera_session::SessionError> {
/// let store = SessionStore::new(MemoryBackend::new(), SessionConfig::default())?;
///
/// let key = store
///     .new_session(&NewSession::new("1.2.3.4", "test-agent", "/home"))
///     .await?;
/// store.claim_user(&key, "alice").await?;
///
/// assert_eq!(store.is_logged_in(&key).await?, Some("alice".to_string()));
/// # Ok(())
/// # }
/// ```
pub struct SessionStore<B: SessionBackend> {
    backend: Arc<B>,
    config: Arc<SessionConfig>,
    keys: Arc<dyn KeySource>,
}

impl<B: SessionBackend> Clone for SessionStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<B: SessionBackend> SessionStore<B> {
    /// Create a store over `backend`. Fails if `config` does not validate.
    pub fn new(backend: B, config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        info!(
            backend = backend.backend_type(),
            lifetime_secs = config.lifetime_secs(),
            native_expiry = backend.native_expiry(),
            "Session store ready"
        );
        let keys = Arc::new(KeyGenerator::new(config.random_bytes));
        Ok(Self {
            backend: Arc::new(backend),
            config: Arc::new(config),
            keys,
        })
    }

    /// Replace the key generator, e.g. with one over a different random source.
    pub fn with_key_source(mut self, keys: impl KeySource + 'static) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The backend sessions live in.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn connection(&self) -> SessionResult<B::Conn> {
        self.backend.connection().await
    }

    // ========== Request-scoped access ==========

    /// Bind a backend connection and a session to one request.
    ///
    /// Reuses the session named by the request's cookie when the backend
    /// still knows it. Otherwise mints an anonymous session and records a
    /// cookie on the handle that the transport must send back. The returned
    /// handle always refers to an existing session.
    pub async fn open(&self, request: &RequestMeta) -> SessionResult<SessionHandle<B>> {
        let mut conn = self.connection().await?;

        if let Some(key) = request
            .cookie(&self.config.cookie_name)
            .and_then(SessionKey::parse)
        {
            if self.has_session_on(&mut conn, &key).await? {
                return Ok(SessionHandle::new(self.clone(), conn, key, None));
            }
            debug!(remote_addr = %request.remote_addr, "Session cookie names no live session");
        }

        let new = NewSession::new(&request.remote_addr, &request.user_agent, &request.uri);
        let key = self.mint_on(&mut conn, &new).await?;
        let cookie = SessionCookie::issue(&key, &self.config);
        Ok(SessionHandle::new(self.clone(), conn, key, Some(cookie)))
    }

    // ========== One-shot operations ==========

    /// Create a session and return its key.
    ///
    /// Fails with [`SessionError::SessionExists`] if the generated key is
    /// already taken; callers retry with a fresh key.
    pub async fn new_session(&self, new: &NewSession) -> SessionResult<SessionKey> {
        let mut conn = self.connection().await?;
        self.new_session_on(&mut conn, new).await
    }

    /// Bind `user` to an anonymous session.
    pub async fn claim_user(&self, key: &SessionKey, user: &str) -> SessionResult<()> {
        let mut conn = self.connection().await?;
        self.claim_user_on(&mut conn, key, user).await
    }

    /// Record the URI most recently visited under this session.
    pub async fn update_location(&self, key: &SessionKey, location: &str) -> SessionResult<()> {
        let mut conn = self.connection().await?;
        self.update_location_on(&mut conn, key, location).await
    }

    /// Read a session and its remaining lifetime.
    pub async fn get(&self, key: &SessionKey) -> SessionResult<Session> {
        let mut conn = self.connection().await?;
        self.get_on(&mut conn, key).await
    }

    /// Whether `key` names a live session.
    pub async fn has_session(&self, key: &SessionKey) -> SessionResult<bool> {
        let mut conn = self.connection().await?;
        self.has_session_on(&mut conn, key).await
    }

    /// The user bound to a session, `None` while it is anonymous.
    ///
    /// An existing anonymous session is not an error.
    pub async fn is_logged_in(&self, key: &SessionKey) -> SessionResult<Option<String>> {
        let mut conn = self.connection().await?;
        self.is_logged_in_on(&mut conn, key).await
    }

    /// Last URI recorded for a session.
    pub async fn last_location(&self, key: &SessionKey) -> SessionResult<String> {
        let mut conn = self.connection().await?;
        Ok(self.get_on(&mut conn, key).await?.location)
    }

    /// Restart a session's lifetime from now.
    pub async fn extend(&self, key: &SessionKey) -> SessionResult<()> {
        let mut conn = self.connection().await?;
        self.extend_on(&mut conn, key).await
    }

    /// Remove a session. Removing an unknown key succeeds.
    pub async fn delete(&self, key: &SessionKey) -> SessionResult<()> {
        let mut conn = self.connection().await?;
        self.delete_on(&mut conn, key).await
    }

    // ========== Protocol over a leased connection ==========

    /// Mint a session, retrying key generation on collision.
    pub(crate) async fn mint_on(
        &self,
        conn: &mut B::Conn,
        new: &NewSession,
    ) -> SessionResult<SessionKey> {
        let mut attempt = 1;
        loop {
            match self.new_session_on(conn, new).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_key_attempts => {
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub(crate) async fn new_session_on(
        &self,
        conn: &mut B::Conn,
        new: &NewSession,
    ) -> SessionResult<SessionKey> {
        let key = self.keys.generate(&new.ip, &new.user_agent)?;

        if conn.exists(key.as_str()).await? {
            warn!(remote_addr = %new.ip, "Generated session key already exists");
            return Err(SessionError::SessionExists);
        }

        let lifetime = self.config.lifetime;
        let expires_at = self.config.expires_from_now();
        conn.hset_all(key.as_str(), &new.to_fields(expires_at), lifetime)
            .await?;

        if !self.backend.native_expiry() {
            sweeper::spawn(Arc::clone(&self.backend), key.clone(), expires_at);
        }

        debug!(
            remote_addr = %new.ip,
            location = %new.location,
            claimed = !new.user.is_empty(),
            "Session created"
        );
        Ok(key)
    }

    pub(crate) async fn claim_user_on(
        &self,
        conn: &mut B::Conn,
        key: &SessionKey,
        user: &str,
    ) -> SessionResult<()> {
        if user.is_empty() {
            return Err(SessionError::EmptyUser);
        }
        self.ensure_live_on(conn, key).await?;

        match conn.hsetnx(key.as_str(), fields::USER, user).await? {
            FieldWrite::Written => {
                debug!(user = %user, "Session claimed");
                Ok(())
            }
            FieldWrite::Unchanged => Err(SessionError::SessionHasUser),
            FieldWrite::MissingKey => Err(SessionError::SessionNotExist),
        }
    }

    pub(crate) async fn update_location_on(
        &self,
        conn: &mut B::Conn,
        key: &SessionKey,
        location: &str,
    ) -> SessionResult<()> {
        self.ensure_live_on(conn, key).await?;
        match conn.hset(key.as_str(), fields::LOCATION, location).await? {
            FieldWrite::MissingKey => Err(SessionError::SessionNotExist),
            FieldWrite::Written | FieldWrite::Unchanged => Ok(()),
        }
    }

    pub(crate) async fn get_on(
        &self,
        conn: &mut B::Conn,
        key: &SessionKey,
    ) -> SessionResult<Session> {
        let (raw, ttl) = conn.hgetall_with_ttl(key.as_str()).await?;
        if raw.is_empty() || !ttl.is_live() {
            return Err(SessionError::SessionNotExist);
        }

        let session = Session::from_fields(key.clone(), raw, ttl)?;
        if session.is_expired() {
            return Err(SessionError::SessionNotExist);
        }
        Ok(session)
    }

    pub(crate) async fn has_session_on(
        &self,
        conn: &mut B::Conn,
        key: &SessionKey,
    ) -> SessionResult<bool> {
        Ok(conn.ttl(key.as_str()).await?.is_live())
    }

    /// Without native expiry a lapsed record lingers until swept; refuse
    /// writes to it so they cannot bring it back.
    async fn ensure_live_on(&self, conn: &mut B::Conn, key: &SessionKey) -> SessionResult<()> {
        if !self.backend.native_expiry() && !self.has_session_on(conn, key).await? {
            return Err(SessionError::SessionNotExist);
        }
        Ok(())
    }

    pub(crate) async fn is_logged_in_on(
        &self,
        conn: &mut B::Conn,
        key: &SessionKey,
    ) -> SessionResult<Option<String>> {
        let session = self.get_on(conn, key).await?;
        Ok((!session.is_anonymous()).then_some(session.user))
    }

    pub(crate) async fn extend_on(
        &self,
        conn: &mut B::Conn,
        key: &SessionKey,
    ) -> SessionResult<()> {
        self.ensure_live_on(conn, key).await?;
        let lifetime = self.config.lifetime;
        let expires_at = self.config.expires_from_now();

        // Move the recorded instant first so a sweeper that wakes in between
        // sees the extension.
        let expires = expires_at.timestamp().to_string();
        if conn.hset(key.as_str(), fields::EXPIRES, &expires).await? == FieldWrite::MissingKey {
            return Err(SessionError::SessionNotExist);
        }
        if !conn.expire(key.as_str(), lifetime).await? {
            return Err(SessionError::SessionNotExist);
        }
        Ok(())
    }

    pub(crate) async fn delete_on(
        &self,
        conn: &mut B::Conn,
        key: &SessionKey,
    ) -> SessionResult<()> {
        if conn.del(key.as_str()).await? {
            debug!("Session deleted");
        }
        Ok(())
    }
}
