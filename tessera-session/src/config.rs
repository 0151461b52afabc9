//! Session configuration.

use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Smallest number of random bytes a session key may carry.
pub const MIN_RANDOM_BYTES: usize = 16;

/// Largest number of random bytes a session key may carry. Leaves room in
/// the key for the client prefix.
pub const MAX_RANDOM_BYTES: usize = 256;

/// Default cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "session";

/// Session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Lifetime of a session, applied as backend TTL and cookie `Max-Age`.
    pub lifetime: Duration,
    /// Cookie name
    pub cookie_name: String,
    /// Cookie `Path` attribute
    pub cookie_path: String,
    /// Emit the `Secure` attribute
    pub secure: bool,
    /// Emit the `HttpOnly` attribute
    pub http_only: bool,
    /// Random bytes mixed into every key
    pub random_bytes: usize,
    /// How many fresh keys to try before giving up on a collision
    pub max_key_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(86400), // 1 day
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: "/".to_string(),
            secure: true,
            http_only: true,
            random_bytes: MIN_RANDOM_BYTES,
            max_key_attempts: 3,
        }
    }
}

impl SessionConfig {
    /// Configuration with the given session lifetime.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_session::SessionConfig;
    /// use std::time::Duration;
    ///
    /// let config = SessionConfig::new(Duration::from_secs(3600));
    /// assert_eq!(config.lifetime_secs(), 3600);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            ..Default::default()
        }
    }

    /// Configuration from `TESSERA_SESSION_TTL` (seconds) and
    /// `TESSERA_SESSION_COOKIE`, falling back to defaults.
    pub fn from_env() -> SessionResult<Self> {
        let mut config = Self::default();

        if let Ok(ttl) = std::env::var("TESSERA_SESSION_TTL") {
            let secs: u64 = ttl.trim().parse().map_err(|_| {
                SessionError::Config(format!("TESSERA_SESSION_TTL is not a number: '{ttl}'"))
            })?;
            config.lifetime = Duration::from_secs(secs);
        }

        if let Ok(name) = std::env::var("TESSERA_SESSION_COOKIE") {
            config.cookie_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the session lifetime.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Set the cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie path.
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Toggle the `Secure` attribute. Only plain-HTTP development setups
    /// should turn it off.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the number of random bytes per key.
    pub fn with_random_bytes(mut self, bytes: usize) -> Self {
        self.random_bytes = bytes;
        self
    }

    /// Set how many keys to try on collision.
    pub fn with_max_key_attempts(mut self, attempts: u32) -> Self {
        self.max_key_attempts = attempts;
        self
    }

    /// Lifetime in whole seconds, as sent to the backend and the cookie.
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime.as_secs()
    }

    /// Instant a session created or extended now should expire at, rounded
    /// up to the whole second it is recorded with.
    pub fn expires_from_now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let lifetime = i64::try_from(self.lifetime_secs()).unwrap_or(i64::MAX);
        let round_up = i64::from(now.timestamp_subsec_nanos() > 0);
        now.timestamp()
            .checked_add(lifetime)
            .and_then(|secs| secs.checked_add(round_up))
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Reject settings the session protocol cannot honour.
    pub fn validate(&self) -> SessionResult<()> {
        if self.lifetime_secs() == 0 {
            return Err(SessionError::Config(
                "session lifetime must be at least one second".to_string(),
            ));
        }
        if !(MIN_RANDOM_BYTES..=MAX_RANDOM_BYTES).contains(&self.random_bytes) {
            return Err(SessionError::Config(format!(
                "session keys need {MIN_RANDOM_BYTES} to {MAX_RANDOM_BYTES} random bytes, got {}",
                self.random_bytes
            )));
        }
        if self.max_key_attempts == 0 {
            return Err(SessionError::Config(
                "max_key_attempts must be at least 1".to_string(),
            ));
        }
        if self.cookie_name.is_empty()
            || self
                .cookie_name
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || "=;,".contains(c))
        {
            return Err(SessionError::Config(format!(
                "invalid cookie name '{}'",
                self.cookie_name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, "session");
        assert!(config.secure);
        assert!(config.http_only);
        assert_eq!(config.random_bytes, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_lifetime() {
        let config = SessionConfig::new(Duration::from_millis(500));
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_rejects_short_entropy() {
        let config = SessionConfig::default().with_random_bytes(8);
        assert!(config.validate().is_err());
        let config = SessionConfig::default().with_random_bytes(MAX_RANDOM_BYTES + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_cookie_name() {
        assert!(SessionConfig::default().with_cookie_name("").validate().is_err());
        assert!(SessionConfig::default().with_cookie_name("a b").validate().is_err());
        assert!(SessionConfig::default().with_cookie_name("a=b").validate().is_err());
    }

    #[test]
    fn test_expires_from_now() {
        let config = SessionConfig::new(Duration::from_secs(60));
        let now = Utc::now();
        let expires = config.expires_from_now();
        assert!(expires >= now + chrono::TimeDelta::seconds(60));
        assert!(expires <= now + chrono::TimeDelta::seconds(61));
        assert_eq!(expires.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = SessionConfig::default().with_max_key_attempts(0);
        assert!(config.validate().is_err());
    }
}
