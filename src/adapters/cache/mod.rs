//! Cache adapter — Redis-backed `FastCache` for production, and a
//! `dashmap`-backed in-memory variant for single-node deployments or
//! graceful degradation when Redis is unreachable.

pub mod dashmap_cache;
pub mod redis_cache;
pub mod redis_rate_limiter;

pub use dashmap_cache::DashmapFastCache;
pub use redis_cache::RedisFastCache;
pub use redis_rate_limiter::RedisRateLimiter;
