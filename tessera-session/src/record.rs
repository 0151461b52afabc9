//! The session record and its hash-field encoding.

use crate::error::{SessionError, SessionResult};
use crate::key::SessionKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Hash field names as stored in the backend.
pub mod fields {
    /// Claimed user, absent while anonymous.
    pub const USER: &str = "user";
    /// Client address at creation.
    pub const IP: &str = "ip";
    /// Client user agent at creation.
    pub const USER_AGENT: &str = "userAgent";
    /// Last visited request URI.
    pub const LOCATION: &str = "location";
    /// Expiration instant, unix seconds.
    pub const EXPIRES: &str = "expires";
}

/// Remaining lifetime of a backend key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// No such key.
    Missing,
    /// Key exists without an expiry.
    Persistent,
    /// Key expires after this long.
    Remaining(Duration),
}

impl KeyTtl {
    /// Interpret a Redis-style `TTL` reply (`-2` absent, `-1` no expiry).
    pub fn from_reply(secs: i64) -> Self {
        match secs {
            -2 => Self::Missing,
            s if s < 0 => Self::Persistent,
            s => Self::Remaining(Duration::from_secs(s as u64)),
        }
    }

    /// Whether a record under this TTL is readable.
    ///
    /// Zero remaining lifetime counts as gone.
    pub fn is_live(&self) -> bool {
        match self {
            Self::Missing => false,
            Self::Persistent => true,
            Self::Remaining(d) => !d.is_zero(),
        }
    }
}

/// Inputs for a new session record.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    /// Client address.
    pub ip: String,
    /// Client user agent.
    pub user_agent: String,
    /// Request URI that caused the session.
    pub location: String,
    /// User to bind immediately; empty for an anonymous session.
    pub user: String,
}

impl NewSession {
    /// Anonymous session for a client.
    pub fn new(
        ip: impl Into<String>,
        user_agent: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
            location: location.into(),
            user: String::new(),
        }
    }

    /// Bind a user from the start.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Hash fields to write. `user` is left out when empty so that a later
    /// conditional set can still claim the session.
    pub fn to_fields(&self, expires_at: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let mut out = vec![
            (fields::IP, self.ip.clone()),
            (fields::USER_AGENT, self.user_agent.clone()),
            (fields::LOCATION, self.location.clone()),
            (fields::EXPIRES, expires_at.timestamp().to_string()),
        ];
        if !self.user.is_empty() {
            out.push((fields::USER, self.user.clone()));
        }
        out
    }
}

/// A session as read back from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Key the record lives under.
    pub key: SessionKey,
    /// Claimed user, empty while anonymous.
    pub user: String,
    /// Client address at creation.
    pub ip: String,
    /// Client user agent at creation.
    pub user_agent: String,
    /// Last visited URI.
    pub location: String,
    /// Recorded expiration instant.
    pub expires_at: Option<DateTime<Utc>>,
    /// Remaining lifetime reported by the backend. Advisory only.
    #[serde(with = "ttl_secs")]
    pub ttl: Duration,
}

impl Session {
    /// Decode a record from its hash fields and TTL.
    ///
    /// Unknown fields are ignored; missing ones decode as empty strings.
    pub fn from_fields(
        key: SessionKey,
        mut raw: HashMap<String, String>,
        ttl: KeyTtl,
    ) -> SessionResult<Self> {
        let mut take = |name: &str| raw.remove(name).unwrap_or_default();

        let expires_at = match take(fields::EXPIRES) {
            s if s.is_empty() => None,
            s => {
                let secs: i64 = s
                    .parse()
                    .map_err(|_| SessionError::Malformed(format!("bad expires value '{s}'")))?;
                Some(DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                    SessionError::Malformed(format!("expires out of range: {secs}"))
                })?)
            }
        };

        let ttl = match ttl {
            KeyTtl::Remaining(d) => d,
            KeyTtl::Persistent | KeyTtl::Missing => expires_at
                .and_then(|at| (at - Utc::now()).to_std().ok())
                .unwrap_or_default(),
        };

        Ok(Self {
            key,
            user: take(fields::USER),
            ip: take(fields::IP),
            user_agent: take(fields::USER_AGENT),
            location: take(fields::LOCATION),
            expires_at,
            ttl,
        })
    }

    /// Whether no user has claimed the session.
    pub fn is_anonymous(&self) -> bool {
        self.user.is_empty()
    }

    /// Whether the recorded expiration instant has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        ttl.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::parse("abc").unwrap()
    }

    #[test]
    fn test_ttl_reply_sentinels() {
        assert_eq!(KeyTtl::from_reply(-2), KeyTtl::Missing);
        assert_eq!(KeyTtl::from_reply(-1), KeyTtl::Persistent);
        assert_eq!(
            KeyTtl::from_reply(30),
            KeyTtl::Remaining(Duration::from_secs(30))
        );
        assert!(!KeyTtl::from_reply(0).is_live());
        assert!(!KeyTtl::Missing.is_live());
        assert!(KeyTtl::Persistent.is_live());
    }

    #[test]
    fn test_anonymous_fields_omit_user() {
        let new = NewSession::new("1.2.3.4", "agent", "/home");
        let fields = new.to_fields(Utc::now());
        assert!(fields.iter().all(|(name, _)| *name != fields::USER));

        let claimed = new.with_user("alice").to_fields(Utc::now());
        assert!(claimed.contains(&(fields::USER, "alice".to_string())));
    }

    #[test]
    fn test_from_fields() {
        let expires = Utc::now() + chrono::Duration::seconds(60);
        let raw: HashMap<String, String> = NewSession::new("1.2.3.4", "agent", "/home")
            .to_fields(expires)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let session =
            Session::from_fields(key(), raw, KeyTtl::Remaining(Duration::from_secs(60))).unwrap();
        assert!(session.is_anonymous());
        assert_eq!(session.ip, "1.2.3.4");
        assert_eq!(session.user_agent, "agent");
        assert_eq!(session.location, "/home");
        assert_eq!(session.expires_at.unwrap().timestamp(), expires.timestamp());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_persistent_ttl_falls_back_to_expires() {
        let expires = Utc::now() + chrono::Duration::seconds(120);
        let raw = HashMap::from([(fields::EXPIRES.to_string(), expires.timestamp().to_string())]);
        let session = Session::from_fields(key(), raw, KeyTtl::Persistent).unwrap();
        assert!(session.ttl > Duration::from_secs(100));
    }

    #[test]
    fn test_malformed_expires() {
        let raw = HashMap::from([(fields::EXPIRES.to_string(), "soon".to_string())]);
        let err = Session::from_fields(key(), raw, KeyTtl::Persistent).unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));
    }

    #[test]
    fn test_json_shape() {
        let raw = HashMap::from([(fields::USER.to_string(), "alice".to_string())]);
        let session =
            Session::from_fields(key(), raw, KeyTtl::Remaining(Duration::from_secs(5))).unwrap();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["user"], "alice");
        assert_eq!(json["userAgent"], "");
        assert_eq!(json["ttl"], 5);
    }
}
