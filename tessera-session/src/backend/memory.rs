//! In-memory session backend
//!
//! Uses DashMap for thread-safe concurrent access. Suitable for single-instance
//! deployments and tests. For anything spanning processes, use Redis.

use crate::backend::{BackendConnection, FieldWrite, SessionBackend};
use crate::error::SessionResult;
use crate::record::KeyTtl;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
struct Entry {
    fields: HashMap<String, String>,
    deadline: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }
}

type Entries = Arc<DashMap<String, Entry>>;

/// In-memory hash store with optional native expiry.
#[derive(Clone)]
pub struct MemoryBackend {
    entries: Entries,
    native_expiry: bool,
}

impl MemoryBackend {
    /// Store that drops keys once their TTL has elapsed.
    pub fn new() -> Self {
        debug!("Creating in-memory session backend");
        Self {
            entries: Arc::new(DashMap::new()),
            native_expiry: true,
        }
    }

    /// Store that records TTLs but never evicts on its own.
    ///
    /// Sessions kept here are expired by the store's sweeper task.
    pub fn without_expiry() -> Self {
        debug!("Creating in-memory session backend without native expiry");
        Self {
            entries: Arc::new(DashMap::new()),
            native_expiry: false,
        }
    }

    /// Number of stored keys, expired ones included until they are evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    type Conn = MemoryConnection;

    async fn connection(&self) -> SessionResult<MemoryConnection> {
        Ok(MemoryConnection {
            entries: Arc::clone(&self.entries),
            native_expiry: self.native_expiry,
        })
    }

    fn native_expiry(&self) -> bool {
        self.native_expiry
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

/// Handle onto a [`MemoryBackend`].
pub struct MemoryConnection {
    entries: Entries,
    native_expiry: bool,
}

impl MemoryConnection {
    /// Evict `key` if it has expired and this backend expires natively.
    fn evict_expired(&self, key: &str) {
        if !self.native_expiry {
            return;
        }
        let now = Instant::now();
        if self.entries.remove_if(key, |_, e| e.expired(now)).is_some() {
            trace!(key = %key, "Evicted expired session");
        }
    }

    /// Writes treat a key past its deadline as missing, evicted or not.
    fn conditional_set(&self, key: &str, field: &str, value: &str, overwrite: bool) -> FieldWrite {
        self.evict_expired(key);
        let now = Instant::now();
        match self.entries.get_mut(key) {
            None => FieldWrite::MissingKey,
            Some(entry) if entry.expired(now) => FieldWrite::MissingKey,
            Some(mut entry) => {
                if !overwrite && entry.fields.contains_key(field) {
                    return FieldWrite::Unchanged;
                }
                entry.fields.insert(field.to_string(), value.to_string());
                FieldWrite::Written
            }
        }
    }
}

#[async_trait]
impl BackendConnection for MemoryConnection {
    async fn exists(&mut self, key: &str) -> SessionResult<bool> {
        self.evict_expired(key);
        Ok(self.entries.contains_key(key))
    }

    async fn hset_all(
        &mut self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> SessionResult<()> {
        self.evict_expired(key);
        let mut entry = self.entries.entry(key.to_string()).or_default();
        for (name, value) in fields {
            entry.fields.insert((*name).to_string(), value.clone());
        }
        entry.deadline = Some(Instant::now() + ttl);
        Ok(())
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> SessionResult<FieldWrite> {
        Ok(self.conditional_set(key, field, value, true))
    }

    async fn hsetnx(&mut self, key: &str, field: &str, value: &str) -> SessionResult<FieldWrite> {
        Ok(self.conditional_set(key, field, value, false))
    }

    async fn hgetall(&mut self, key: &str) -> SessionResult<HashMap<String, String>> {
        self.evict_expired(key);
        Ok(self
            .entries
            .get(key)
            .map(|e| e.fields.clone())
            .unwrap_or_default())
    }

    async fn ttl(&mut self, key: &str) -> SessionResult<KeyTtl> {
        self.evict_expired(key);
        let ttl = match self.entries.get(key) {
            None => KeyTtl::Missing,
            Some(entry) => match entry.deadline {
                None => KeyTtl::Persistent,
                Some(deadline) => {
                    KeyTtl::Remaining(deadline.saturating_duration_since(Instant::now()))
                }
            },
        };
        Ok(ttl)
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> SessionResult<bool> {
        self.evict_expired(key);
        let now = Instant::now();
        match self.entries.get_mut(key) {
            None => Ok(false),
            Some(entry) if entry.expired(now) => Ok(false),
            Some(mut entry) => {
                entry.deadline = Some(now + ttl);
                Ok(true)
            }
        }
    }

    async fn del(&mut self, key: &str) -> SessionResult<bool> {
        self.evict_expired(key);
        Ok(self.entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<(&'static str, String)> {
        vec![("ip", "1.2.3.4".to_string()), ("location", "/".to_string())]
    }

    #[tokio::test]
    async fn test_conditional_writes_never_create_keys() {
        let backend = MemoryBackend::new();
        let mut conn = backend.connection().await.unwrap();

        assert_eq!(
            conn.hset("missing", "location", "/x").await.unwrap(),
            FieldWrite::MissingKey
        );
        assert_eq!(
            conn.hsetnx("missing", "user", "alice").await.unwrap(),
            FieldWrite::MissingKey
        );
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_hsetnx_only_once() {
        let backend = MemoryBackend::new();
        let mut conn = backend.connection().await.unwrap();
        conn.hset_all("k", &fields(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            conn.hsetnx("k", "user", "alice").await.unwrap(),
            FieldWrite::Written
        );
        assert_eq!(
            conn.hsetnx("k", "user", "bob").await.unwrap(),
            FieldWrite::Unchanged
        );
        assert_eq!(conn.hgetall("k").await.unwrap()["user"], "alice");
    }

    #[tokio::test]
    async fn test_ttl_sentinels() {
        let backend = MemoryBackend::new();
        let mut conn = backend.connection().await.unwrap();
        assert_eq!(conn.ttl("k").await.unwrap(), KeyTtl::Missing);

        conn.hset_all("k", &fields(), Duration::from_secs(60))
            .await
            .unwrap();
        match conn.ttl("k").await.unwrap() {
            KeyTtl::Remaining(d) => assert!(d > Duration::from_secs(58)),
            other => panic!("unexpected ttl {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_native_expiry_evicts() {
        let backend = MemoryBackend::new();
        let mut conn = backend.connection().await.unwrap();
        conn.hset_all("k", &fields(), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!conn.exists("k").await.unwrap());
        assert!(conn.hgetall("k").await.unwrap().is_empty());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_without_expiry_keeps_keys() {
        let backend = MemoryBackend::without_expiry();
        assert!(!backend.native_expiry());
        let mut conn = backend.connection().await.unwrap();
        conn.hset_all("k", &fields(), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(conn.exists("k").await.unwrap());
        assert_eq!(conn.ttl("k").await.unwrap(), KeyTtl::Remaining(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_lapsed_key_refuses_writes() {
        let backend = MemoryBackend::without_expiry();
        let mut conn = backend.connection().await.unwrap();
        conn.hset_all("k", &fields(), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            conn.hset("k", "location", "/late").await.unwrap(),
            FieldWrite::MissingKey
        );
        assert_eq!(
            conn.hsetnx("k", "user", "alice").await.unwrap(),
            FieldWrite::MissingKey
        );
        assert!(!conn.expire("k", Duration::from_secs(60)).await.unwrap());

        // Still there for the sweeper, and still lapsed.
        assert_eq!(conn.hgetall("k").await.unwrap()["location"], "/");
        assert_eq!(conn.ttl("k").await.unwrap(), KeyTtl::Remaining(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_del_is_idempotent() {
        let backend = MemoryBackend::new();
        let mut conn = backend.connection().await.unwrap();
        conn.hset_all("k", &fields(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(conn.del("k").await.unwrap());
        assert!(!conn.del("k").await.unwrap());
    }
}
