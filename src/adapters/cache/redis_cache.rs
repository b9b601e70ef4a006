//! Redis-backed `FastCache`. Connection failures surface as `CacheError`
//! rather than panicking — callers are required to treat the cache as a
//! recoverable dependency (spec.md §4.F).

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use crate::core::cache::{CacheError, CacheLookup, FastCache};

#[derive(Clone)]
pub struct RedisFastCache {
    connection: ConnectionManager,
}

impl RedisFastCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url).map_err(|e| CacheError(e.to_string()))?;
        let connection = ConnectionManager::new(client).await.map_err(|e| CacheError(e.to_string()))?;
        Ok(Self { connection })
    }
}

#[async_trait::async_trait]
impl FastCache for RedisFastCache {
    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| CacheError(e.to_string()))?;
        Ok(match value {
            Some(v) => CacheLookup::Hit(v),
            None => CacheLookup::Miss,
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await.map_err(|e| CacheError(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key).await.map_err(|e| CacheError(e.to_string()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = conn.keys(&pattern).await.map_err(|e| CacheError(e.to_string()))?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await.map_err(|e| CacheError(e.to_string()))?;
        }
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64, CacheError> {
        let mut conn = self.connection.clone();
        let new_value: i64 = conn.incr(key, 1).await.map_err(|e| CacheError(e.to_string()))?;
        if new_value == 1 {
            conn.expire::<_, ()>(key, ttl.as_secs().max(1) as i64).await.map_err(|e| CacheError(e.to_string()))?;
        }
        Ok(new_value)
    }
}
