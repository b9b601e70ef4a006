//! Sliding-window rate limiter (component E).
//!
//! `check` is specified as a single atomic operation over the fast cache:
//! trim entries older than `now - window`, count, reject if `count >= limit`,
//! else record `now` and refresh the expiry. Implementations live in
//! `adapters::cache` (Redis sorted-set or in-memory deque).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub current: u64,
    pub reset_at: DateTime<Utc>,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// `scope` groups counters by action (e.g. "login:email", "login:ip");
    /// `identifier` is the key within that scope (an email or IP).
    async fn check(
        &self,
        scope: &str,
        identifier: &str,
        limit: u64,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, crate::core::cache::CacheError>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory sliding-window limiter, used by unit tests for services that
    /// depend on `RateLimiter` without pulling in Redis.
    #[derive(Default)]
    pub struct InMemoryRateLimiter {
        windows: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
    }

    #[async_trait]
    impl RateLimiter for InMemoryRateLimiter {
        async fn check(
            &self,
            scope: &str,
            identifier: &str,
            limit: u64,
            window: Duration,
            now: DateTime<Utc>,
        ) -> Result<RateLimitDecision, crate::core::cache::CacheError> {
            let key = format!("{scope}:{identifier}");
            let mut windows = self.windows.lock().unwrap();
            let entries = windows.entry(key).or_default();
            let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
            let cutoff = now - window;
            entries.retain(|t| *t > cutoff);

            let current = entries.len() as u64;
            if current >= limit {
                return Ok(RateLimitDecision {
                    allowed: false,
                    current,
                    reset_at: entries.first().copied().unwrap_or(now) + window,
                });
            }

            entries.push(now);
            Ok(RateLimitDecision {
                allowed: true,
                current: current + 1,
                reset_at: now + window,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::InMemoryRateLimiter;
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn allows_up_to_limit_then_rejects() {
        let limiter = InMemoryRateLimiter::default();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for _ in 0..5 {
            let d = limiter
                .check("login:email", "a@b.com", 5, Duration::from_secs(900), now)
                .await
                .unwrap();
            assert!(d.allowed);
        }
        let rejected = limiter
            .check("login:email", "a@b.com", 5, Duration::from_secs(900), now)
            .await
            .unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.current, 5);
    }

    #[tokio::test]
    async fn window_expiry_frees_up_capacity() {
        let limiter = InMemoryRateLimiter::default();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for _ in 0..5 {
            limiter
                .check("login:email", "a@b.com", 5, Duration::from_secs(900), t0)
                .await
                .unwrap();
        }
        let after_window = t0 + chrono::Duration::seconds(901);
        let decision = limiter
            .check(
                "login:email",
                "a@b.com",
                5,
                Duration::from_secs(900),
                after_window,
            )
            .await
            .unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let limiter = InMemoryRateLimiter::default();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for _ in 0..20 {
            limiter
                .check("login:ip", "1.2.3.4", 20, Duration::from_secs(3600), now)
                .await
                .unwrap();
        }
        let email_decision = limiter
            .check("login:email", "a@b.com", 5, Duration::from_secs(900), now)
            .await
            .unwrap();
        assert!(email_decision.allowed);
    }
}
