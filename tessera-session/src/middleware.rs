//! HTTP integration: bind a session to every request.

use crate::backend::SessionBackend;
use crate::error::SessionError;
use crate::handle::SessionHandle;
use crate::request::RequestMeta;
use crate::store::SessionStore;
use futures::future::BoxFuture;
use http::header::SET_COOKIE;
use http::{Request, Response, StatusCode};
use tracing::{error, warn};

/// Session middleware over `http` request and response types.
///
/// For each request it reuses or mints a session, records the request URI
/// as the session's location, and after the handler runs attaches whatever
/// cookie the handle has queued.
///
/// # Examples
///
/// ```
/// use tessera_session::{MemoryBackend, SessionConfig, SessionMiddleware, SessionStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tessera_session::SessionError> {
/// let store = SessionStore::new(MemoryBackend::new(), SessionConfig::default())?;
/// let middleware = SessionMiddleware::new(store);
///
/// let request = http::Request::builder().uri("/home").body(()).unwrap();
/// let response = middleware
///     .run(request, "1.2.3.4", |_req, session| {
///         Box::pin(async move {
///             let user = session.is_logged_in().await.ok().flatten();
///             http::Response::new(user.unwrap_or_default())
///         })
///     })
///     .await;
///
/// assert!(response.headers().contains_key(http::header::SET_COOKIE));
/// # Ok(())
/// # }
/// ```
pub struct SessionMiddleware<B: SessionBackend> {
    store: SessionStore<B>,
}

impl<B: SessionBackend> Clone for SessionMiddleware<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<B: SessionBackend> SessionMiddleware<B> {
    pub fn new(store: SessionStore<B>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SessionStore<B> {
        &self.store
    }

    /// Open the session for a request.
    ///
    /// Failing to record the location of an existing session is logged and
    /// otherwise ignored.
    pub async fn begin<T>(
        &self,
        request: &Request<T>,
        remote_addr: &str,
    ) -> Result<SessionHandle<B>, SessionError> {
        let meta = RequestMeta::from_request(request, remote_addr);
        self.begin_with(&meta).await
    }

    /// [`begin`](Self::begin) for an already extracted request.
    pub async fn begin_with(&self, meta: &RequestMeta) -> Result<SessionHandle<B>, SessionError> {
        let mut handle = self.store.open(meta).await.inspect_err(|e| {
            error!(remote_addr = %meta.remote_addr, uri = %meta.uri, error = %e, "Failed to open session");
        })?;

        // A new session already carries the request URI.
        if !handle.is_new() {
            if let Err(e) = handle.update_location(&meta.uri).await {
                warn!(uri = %meta.uri, error = %e, "Failed to record session location");
            }
        }
        Ok(handle)
    }

    /// Attach the handle's queued cookie to `response`.
    pub fn finish<R>(&self, handle: &mut SessionHandle<B>, response: &mut Response<R>) {
        let Some(cookie) = handle.take_cookie() else {
            return;
        };
        match cookie.header_value() {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Session cookie is not a valid header value"),
        }
    }

    /// Bare 500 response for a request whose session could not be opened.
    pub fn failure_response<R: Default>(err: &SessionError) -> Response<R> {
        error!(error = %err, "Session unavailable, rejecting request");
        let mut response = Response::new(R::default());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }

    /// Run `next` with the request's session.
    ///
    /// Answers 500 without calling `next` if the session cannot be opened.
    /// The handle, and with it the backend connection, is released before
    /// this returns.
    pub async fn run<T, R, F>(&self, request: Request<T>, remote_addr: &str, next: F) -> Response<R>
    where
        R: Default,
        F: for<'h> FnOnce(Request<T>, &'h mut SessionHandle<B>) -> BoxFuture<'h, Response<R>>,
    {
        let mut handle = match self.begin(&request, remote_addr).await {
            Ok(handle) => handle,
            Err(e) => return Self::failure_response(&e),
        };

        let mut response = next(request, &mut handle).await;
        self.finish(&mut handle, &mut response);
        handle.close();
        response
    }
}
