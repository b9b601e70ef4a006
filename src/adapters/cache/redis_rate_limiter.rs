//! Redis sorted-set sliding-window `RateLimiter`.
//!
//! One ZSET per `scope:identifier`, scored by request timestamp. `check`
//! trims entries older than `now - window`, counts what's left, and either
//! rejects or records `now` as a new member — mirroring the in-memory fake's
//! semantics but atomically via a single pipelined round trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use crate::core::cache::CacheError;
use crate::core::rate_limit::{RateLimitDecision, RateLimiter};

#[derive(Clone)]
pub struct RedisRateLimiter {
    connection: ConnectionManager,
}

impl RedisRateLimiter {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, scope: &str, identifier: &str, limit: u64, window: Duration, now: DateTime<Utc>) -> Result<RateLimitDecision, CacheError> {
        let mut conn = self.connection.clone();
        let key = format!("ratelimit:{scope}:{identifier}");
        let now_millis = now.timestamp_millis();
        let cutoff_millis = now_millis - window.as_millis() as i64;
        let window_duration = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

        conn.zrembyscore::<_, _, _, ()>(&key, i64::MIN, cutoff_millis).await.map_err(|e| CacheError(e.to_string()))?;
        let current: u64 = conn.zcard(&key).await.map_err(|e| CacheError(e.to_string()))?;

        if current >= limit {
            let oldest: Vec<(String, i64)> = conn.zrange_withscores(&key, 0, 0).await.map_err(|e| CacheError(e.to_string()))?;
            let reset_at = oldest.first().and_then(|(_, score)| DateTime::from_timestamp_millis(*score)).unwrap_or(now) + window_duration;
            return Ok(RateLimitDecision { allowed: false, current, reset_at });
        }

        let member = format!("{now_millis}:{}", uuid::Uuid::new_v4());
        conn.zadd::<_, _, _, ()>(&key, member, now_millis).await.map_err(|e| CacheError(e.to_string()))?;
        conn.expire::<_, ()>(&key, window.as_secs().max(1) as i64).await.map_err(|e| CacheError(e.to_string()))?;

        Ok(RateLimitDecision {
            allowed: true,
            current: current + 1,
            reset_at: now + window_duration,
        })
    }
}
