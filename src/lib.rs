// Tessera - cookie-bound sessions for small web servers
//
// Re-exports the session store and, with the `redis` feature, the Redis
// connection layer it runs on.

pub mod logging;

// Re-export the session store
pub use tessera_session::*;

#[cfg(feature = "redis")]
pub use tessera_redis;

pub use tessera_session;

// Prelude for common imports
pub mod prelude {
    pub use tessera_session::prelude::*;

    #[cfg(feature = "redis")]
    pub use tessera_redis::{RedisConfig, RedisService};
}
