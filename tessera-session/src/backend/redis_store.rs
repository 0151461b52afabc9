//! Redis session backend
//!
//! Sessions are Redis hashes with a key TTL. Conditional writes run as Lua
//! scripts so the existence check and the write are one atomic step.
//! Requires the `redis` feature (enabled by default).

use crate::backend::{BackendConnection, FieldWrite, SessionBackend};
use crate::error::SessionResult;
use crate::record::KeyTtl;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tessera_redis::{RedisConfig, RedisConnection, RedisService};
use tracing::{debug, trace};

/// `HSET` guarded by `EXISTS`: -1 missing key, 1 written.
static HSET_IF_EXISTS: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r#"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return -1
        end
        redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
        return 1
        "#,
    )
});

/// `HSETNX` guarded by `EXISTS`: -1 missing key, 0 already set, 1 written.
static HSETNX_IF_EXISTS: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r#"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return -1
        end
        return redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2])
        "#,
    )
});

fn field_write(code: i64) -> FieldWrite {
    match code {
        1 => FieldWrite::Written,
        0 => FieldWrite::Unchanged,
        _ => FieldWrite::MissingKey,
    }
}

/// Redis-backed session storage over a shared [`RedisService`] pool.
///
/// # Examples
///
/// ```no_run
/// use tessera_session::{RedisBackend, SessionConfig, SessionStore};
/// use tessera_redis::RedisConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = RedisBackend::connect(RedisConfig::from_env().build()).await?;
/// let store = SessionStore::new(backend, SessionConfig::from_env()?)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    redis: Arc<RedisService>,
}

impl RedisBackend {
    /// Build a pool from `config` and verify it can reach the server.
    pub async fn connect(config: RedisConfig) -> SessionResult<Self> {
        debug!(url = %config.url, "Connecting to Redis for session storage");
        let redis = RedisService::new(config).await?;
        Ok(Self::new(Arc::new(redis)))
    }

    /// Use an existing service, e.g. one shared with other components.
    pub fn new(redis: Arc<RedisService>) -> Self {
        Self { redis }
    }

    /// The underlying service.
    pub fn service(&self) -> &RedisService {
        &self.redis
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    type Conn = RedisBackendConnection;

    async fn connection(&self) -> SessionResult<RedisBackendConnection> {
        let conn = self.redis.get().await?;
        Ok(RedisBackendConnection {
            conn,
            redis: Arc::clone(&self.redis),
        })
    }

    fn backend_type(&self) -> &'static str {
        "redis"
    }
}

/// One pooled Redis connection; returned to the pool on drop.
pub struct RedisBackendConnection {
    conn: RedisConnection,
    redis: Arc<RedisService>,
}

#[async_trait]
impl BackendConnection for RedisBackendConnection {
    async fn exists(&mut self, key: &str) -> SessionResult<bool> {
        let exists: bool = self
            .redis
            .timed(redis::cmd("EXISTS").arg(key).query_async(&mut *self.conn))
            .await?;
        Ok(exists)
    }

    async fn hset_all(
        &mut self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> SessionResult<()> {
        trace!(key = %key, fields = fields.len(), "HSET + EXPIRE batch");

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(key, fields)
            .ignore()
            .expire(key, ttl.as_secs() as i64)
            .ignore();

        let () = self.redis.timed(pipe.query_async(&mut *self.conn)).await?;
        Ok(())
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> SessionResult<FieldWrite> {
        let mut invocation = HSET_IF_EXISTS.key(key);
        invocation.arg(field).arg(value);
        let code: i64 = self
            .redis
            .timed(invocation.invoke_async(&mut *self.conn))
            .await?;
        Ok(field_write(code))
    }

    async fn hsetnx(&mut self, key: &str, field: &str, value: &str) -> SessionResult<FieldWrite> {
        let mut invocation = HSETNX_IF_EXISTS.key(key);
        invocation.arg(field).arg(value);
        let code: i64 = self
            .redis
            .timed(invocation.invoke_async(&mut *self.conn))
            .await?;
        Ok(field_write(code))
    }

    async fn hgetall(&mut self, key: &str) -> SessionResult<HashMap<String, String>> {
        let fields: HashMap<String, String> = self
            .redis
            .timed(redis::cmd("HGETALL").arg(key).query_async(&mut *self.conn))
            .await?;
        Ok(fields)
    }

    async fn ttl(&mut self, key: &str) -> SessionResult<KeyTtl> {
        let secs: i64 = self
            .redis
            .timed(redis::cmd("TTL").arg(key).query_async(&mut *self.conn))
            .await?;
        Ok(KeyTtl::from_reply(secs))
    }

    async fn hgetall_with_ttl(
        &mut self,
        key: &str,
    ) -> SessionResult<(HashMap<String, String>, KeyTtl)> {
        let mut pipe = redis::pipe();
        pipe.cmd("HGETALL").arg(key).cmd("TTL").arg(key);

        let (fields, secs): (HashMap<String, String>, i64) =
            self.redis.timed(pipe.query_async(&mut *self.conn)).await?;
        Ok((fields, KeyTtl::from_reply(secs)))
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> SessionResult<bool> {
        let set: bool = self
            .redis
            .timed(
                redis::cmd("EXPIRE")
                    .arg(key)
                    .arg(ttl.as_secs())
                    .query_async(&mut *self.conn),
            )
            .await?;
        Ok(set)
    }

    async fn del(&mut self, key: &str) -> SessionResult<bool> {
        let removed: i64 = self
            .redis
            .timed(redis::cmd("DEL").arg(key).query_async(&mut *self.conn))
            .await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_reply_mapping() {
        assert_eq!(field_write(1), FieldWrite::Written);
        assert_eq!(field_write(0), FieldWrite::Unchanged);
        assert_eq!(field_write(-1), FieldWrite::MissingKey);
    }

    async fn backend() -> RedisBackend {
        let config = RedisConfig::builder()
            .url("redis://localhost:6379")
            .pool_size(4)
            .build();
        RedisBackend::connect(config).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_guarded_writes_against_redis() {
        let backend = backend().await;
        let mut conn = backend.connection().await.unwrap();
        let key = "tessera-test:guarded";
        conn.del(key).await.unwrap();

        assert_eq!(
            conn.hsetnx(key, "user", "alice").await.unwrap(),
            FieldWrite::MissingKey
        );
        assert!(!conn.exists(key).await.unwrap());

        conn.hset_all(key, &[("ip", "1.2.3.4".to_string())], Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(
            conn.hsetnx(key, "user", "alice").await.unwrap(),
            FieldWrite::Written
        );
        assert_eq!(
            conn.hsetnx(key, "user", "bob").await.unwrap(),
            FieldWrite::Unchanged
        );

        let (fields, ttl) = conn.hgetall_with_ttl(key).await.unwrap();
        assert_eq!(fields["user"], "alice");
        assert!(ttl.is_live());

        assert!(conn.del(key).await.unwrap());
        assert_eq!(conn.ttl(key).await.unwrap(), KeyTtl::Missing);
    }
}
