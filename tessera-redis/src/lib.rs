//! # Tessera Redis
//!
//! Pooled Redis connections for Tessera's session store.
//!
//! ## Features
//!
//! - **Connection Pooling**: bounded pool built on bb8
//! - **Owned leases**: connections can be moved into request-scoped values
//! - **Timeouts**: per-command deadline from configuration
//! - **Environment config**: `TESSERA_REDIS_*` variables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera_redis::{RedisConfig, RedisService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::from_env().pool_size(4).build();
//!     let redis = RedisService::new(config).await?;
//!
//!     let mut conn = redis.get().await?;
//!     let exists: bool = redis
//!         .timed(redis::cmd("EXISTS").arg("some-key").query_async(&mut *conn))
//!         .await?;
//!     println!("exists: {exists}");
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pool;
mod service;

pub use config::{ENV_PREFIX, RedisConfig, RedisConfigBuilder};
pub use error::{RedisError, Result};
pub use pool::{RedisConnection, RedisPool, RedisPoolBuilder};
pub use service::{PoolStats, RedisService};

// Re-export redis crate for convenience
pub use redis;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::config::{RedisConfig, RedisConfigBuilder};
    pub use crate::error::{RedisError, Result};
    pub use crate::pool::{RedisConnection, RedisPool};
    pub use crate::service::RedisService;
}
