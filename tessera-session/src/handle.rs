//! Request-scoped session access.

use crate::backend::SessionBackend;
use crate::cookie::SessionCookie;
use crate::error::SessionResult;
use crate::key::SessionKey;
use crate::record::Session;
use crate::store::SessionStore;
use tracing::debug;

/// One request's view of its session.
///
/// Holds a leased backend connection for the lifetime of the request; the
/// connection goes back to the pool when the handle is dropped or
/// [`close`](Self::close)d, on every exit path.
pub struct SessionHandle<B: SessionBackend> {
    store: SessionStore<B>,
    conn: B::Conn,
    key: SessionKey,
    cookie: Option<SessionCookie>,
    fresh: bool,
}

impl<B: SessionBackend> SessionHandle<B> {
    pub(crate) fn new(
        store: SessionStore<B>,
        conn: B::Conn,
        key: SessionKey,
        cookie: Option<SessionCookie>,
    ) -> Self {
        let fresh = cookie.is_some();
        Self {
            store,
            conn,
            key,
            cookie,
            fresh,
        }
    }

    /// Key of the bound session.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Whether the session was minted for this request.
    pub fn is_new(&self) -> bool {
        self.fresh
    }

    /// Cookie waiting to be sent to the client, if any.
    pub fn pending_cookie(&self) -> Option<&SessionCookie> {
        self.cookie.as_ref()
    }

    /// Remove and return the pending cookie.
    pub fn take_cookie(&mut self) -> Option<SessionCookie> {
        self.cookie.take()
    }

    /// Whether the session is still live in the backend.
    pub async fn has_session(&mut self) -> SessionResult<bool> {
        self.store.has_session_on(&mut self.conn, &self.key).await
    }

    /// The user bound to the session, `None` while anonymous.
    pub async fn is_logged_in(&mut self) -> SessionResult<Option<String>> {
        self.store.is_logged_in_on(&mut self.conn, &self.key).await
    }

    /// Bind `user` to the session. See [`SessionStore::claim_user`].
    pub async fn claim_user(&mut self, user: &str) -> SessionResult<()> {
        self.store
            .claim_user_on(&mut self.conn, &self.key, user)
            .await
    }

    /// Claim the session for `user` and restart its lifetime.
    ///
    /// A refreshed cookie is queued so the client's copy lives as long as
    /// the record.
    pub async fn log_in(&mut self, user: &str) -> SessionResult<()> {
        self.claim_user(user).await?;
        self.extend().await?;
        debug!(user = %user, "Logged in");
        Ok(())
    }

    /// Record `location` as the session's last visited URI.
    pub async fn update_location(&mut self, location: &str) -> SessionResult<()> {
        self.store
            .update_location_on(&mut self.conn, &self.key, location)
            .await
    }

    /// Read the full session record.
    pub async fn get(&mut self) -> SessionResult<Session> {
        self.store.get_on(&mut self.conn, &self.key).await
    }

    /// Last URI recorded for the session.
    pub async fn last_location(&mut self) -> SessionResult<String> {
        Ok(self.get().await?.location)
    }

    /// Restart the session lifetime and queue a refreshed cookie.
    pub async fn extend(&mut self) -> SessionResult<()> {
        self.store.extend_on(&mut self.conn, &self.key).await?;
        self.cookie = Some(SessionCookie::issue(&self.key, self.store.config()));
        Ok(())
    }

    /// Delete the session and queue a cookie that clears it on the client.
    ///
    /// Later calls on this handle report the session as gone.
    pub async fn log_out(&mut self) -> SessionResult<()> {
        self.store.delete_on(&mut self.conn, &self.key).await?;
        self.cookie = Some(SessionCookie::removal(self.store.config()));
        Ok(())
    }

    /// Release the backend connection now.
    pub fn close(self) {}
}
