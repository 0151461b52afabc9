//! Session storage backends
//!
//! The store drives a backend through a narrow hash-per-key command set:
//!
//! - **Memory**: in-process storage using DashMap (tests, single instance)
//! - **Redis**: pooled Redis connections, the production backend

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::{MemoryBackend, MemoryConnection};
#[cfg(feature = "redis")]
pub use redis_store::{RedisBackend, RedisBackendConnection};

use crate::error::SessionResult;
use crate::record::KeyTtl;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Outcome of a conditional field write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWrite {
    /// The field now holds the new value.
    Written,
    /// The field already had a value and was left alone.
    Unchanged,
    /// The key does not exist; nothing was written.
    MissingKey,
}

/// A key-value service holding session hashes.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Connection type leased per request.
    type Conn: BackendConnection;

    /// Lease a connection. Dropping it gives it back.
    async fn connection(&self) -> SessionResult<Self::Conn>;

    /// Whether the backend removes keys by itself once their TTL runs out.
    ///
    /// Backends returning `false` get a sweeper task per session.
    fn native_expiry(&self) -> bool {
        true
    }

    /// Backend name for logs.
    fn backend_type(&self) -> &'static str;
}

/// Commands the session store needs from one backend connection.
///
/// Conditional writes never create a key: a session that expired between
/// two calls must stay gone.
#[async_trait]
pub trait BackendConnection: Send {
    /// `EXISTS key`
    async fn exists(&mut self, key: &str) -> SessionResult<bool>;

    /// `HSET key f v ...` followed by `EXPIRE key ttl`, applied as one atomic
    /// batch in a single round trip.
    async fn hset_all(
        &mut self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> SessionResult<()>;

    /// `HSET key field value`, only if `key` exists.
    async fn hset(&mut self, key: &str, field: &str, value: &str) -> SessionResult<FieldWrite>;

    /// `HSETNX key field value`, only if `key` exists. Must be a true
    /// compare-and-set: of several concurrent callers at most one sees
    /// [`FieldWrite::Written`].
    async fn hsetnx(&mut self, key: &str, field: &str, value: &str) -> SessionResult<FieldWrite>;

    /// `HGETALL key`; empty for an absent key.
    async fn hgetall(&mut self, key: &str) -> SessionResult<HashMap<String, String>>;

    /// `TTL key`
    async fn ttl(&mut self, key: &str) -> SessionResult<KeyTtl>;

    /// `HGETALL` and `TTL` together. Backends that can pipeline should
    /// override this to make it one round trip.
    async fn hgetall_with_ttl(
        &mut self,
        key: &str,
    ) -> SessionResult<(HashMap<String, String>, KeyTtl)> {
        let fields = self.hgetall(key).await?;
        let ttl = self.ttl(key).await?;
        Ok((fields, ttl))
    }

    /// `EXPIRE key ttl`; `false` if the key is absent.
    async fn expire(&mut self, key: &str, ttl: Duration) -> SessionResult<bool>;

    /// `DEL key`; `false` if nothing was removed.
    async fn del(&mut self, key: &str) -> SessionResult<bool>;
}
