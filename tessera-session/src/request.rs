//! What the session layer needs to know about an incoming request.

use crate::cookie::Cookies;
use http::header::{COOKIE, USER_AGENT};

/// Transport-neutral view of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Client address as the transport reports it.
    pub remote_addr: String,
    /// `User-Agent` header, empty when absent.
    pub user_agent: String,
    /// Request URI: path plus query.
    pub uri: String,
    /// Request method.
    pub method: String,
    /// Parsed `Cookie` headers.
    pub cookies: Cookies,
}

impl RequestMeta {
    /// Bare request from `remote_addr` for `uri`.
    pub fn new(remote_addr: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            uri: uri.into(),
            method: http::Method::GET.to_string(),
            ..Default::default()
        }
    }

    /// Extract metadata from an `http` request.
    pub fn from_request<T>(request: &http::Request<T>, remote_addr: impl Into<String>) -> Self {
        let headers = request.headers();

        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut cookies = Cookies::new();
        for value in headers.get_all(COOKIE) {
            if let Ok(value) = value.to_str() {
                cookies.extend_from_header(value);
            }
        }

        let uri = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();

        Self {
            remote_addr: remote_addr.into(),
            user_agent,
            uri,
            method: request.method().to_string(),
            cookies,
        }
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Add a client cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push(name, value);
        self
    }

    /// Value of the cookie called `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name)
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(p, _)| p)
    }

    /// Raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, q)| q)
    }
}
