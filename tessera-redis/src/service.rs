//! Shared Redis service.

use std::future::Future;

use crate::{
    RedisConfig, RedisError, Result,
    pool::{RedisConnection, RedisPool, RedisPoolBuilder},
};

/// Connection pool plus the settings it was built from.
///
/// Construct one per process and hand clones of the owning `Arc` (or of the
/// types built on top of it) to whatever needs Redis.
pub struct RedisService {
    config: RedisConfig,
    pool: RedisPool,
}

impl RedisService {
    /// Connect using `config`.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = RedisPoolBuilder::new(config.clone()).build().await?;
        Ok(Self { config, pool })
    }

    /// Settings in use.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Underlying pool.
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    /// Lease a connection. It returns to the pool when dropped.
    pub async fn get(&self) -> Result<RedisConnection> {
        let conn = self.pool.get_owned().await?;
        Ok(RedisConnection::new(conn))
    }

    /// Run `fut` under the configured command timeout.
    pub async fn timed<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(result) => result.map_err(RedisError::from),
            Err(_) => Err(RedisError::Timeout),
        }
    }

    /// `PING` through a pooled connection.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get().await?;
        let _: String = self.timed(redis::cmd("PING").query_async(&mut *conn)).await?;
        Ok(())
    }

    /// Current pool occupancy.
    pub fn pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections.
    pub connections: u32,
    /// Connections currently idle.
    pub idle_connections: u32,
}
