//! Session cookie encoding and `Cookie` header parsing.

use crate::config::SessionConfig;
use crate::key::SessionKey;
use http::HeaderValue;
use http::header::InvalidHeaderValue;
use std::fmt;

/// A `Set-Cookie` the transport must send for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name
    pub name: String,
    /// Session key, empty for a removal cookie
    pub value: String,
    /// `Max-Age` in seconds; zero removes the cookie
    pub max_age: u64,
    /// `Path` attribute
    pub path: String,
    /// `Secure` attribute
    pub secure: bool,
    /// `HttpOnly` attribute
    pub http_only: bool,
}

impl SessionCookie {
    /// Cookie carrying `key` for the configured lifetime.
    pub fn issue(key: &SessionKey, config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            value: key.as_str().to_string(),
            max_age: config.lifetime_secs(),
            path: config.cookie_path.clone(),
            secure: config.secure,
            http_only: config.http_only,
        }
    }

    /// Cookie telling the client to forget its session.
    pub fn removal(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            value: String::new(),
            max_age: 0,
            path: config.cookie_path.clone(),
            secure: config.secure,
            http_only: config.http_only,
        }
    }

    /// Whether this cookie clears the session on the client.
    pub fn is_removal(&self) -> bool {
        self.max_age == 0
    }

    /// Encode as a `Set-Cookie` header value.
    pub fn header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_string())
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path={}; Max-Age={}",
            self.name, self.value, self.path, self.max_age
        )?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

/// Cookies sent by a client, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    inner: Vec<(String, String)>,
}

impl Cookies {
    /// Empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cookie.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Value of the first cookie called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of cookies.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the jar is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Parse one `Cookie` header value and append what it holds.
    ///
    /// Pairs without `=` are skipped. Values may be double-quoted.
    pub fn extend_from_header(&mut self, header: &str) {
        for pair in header.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            if let Some((name, value)) = pair.split_once('=') {
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                self.push(name.trim(), value);
            }
        }
    }

    /// Parse a `Cookie` header value.
    pub fn parse(header: &str) -> Self {
        let mut cookies = Self::new();
        cookies.extend_from_header(header);
        cookies
    }
}
