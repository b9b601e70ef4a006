//! Fast-cache port.
//!
//! Spec.md describes cache *operations*, not the KV store implementation
//! (explicitly out of scope, §1). `FastCache` is the port every use case
//! programs against; `adapters::cache` supplies a `redis` adapter for
//! production and an in-memory adapter for tests and graceful degradation.
//!
//! All values are opaque strings (JSON-encoded by the caller) with an
//! expiry — sum types, not sentinel values, for hit/miss.

use async_trait::async_trait;
use std::time::Duration;

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(String),
    Miss,
}

impl CacheLookup {
    pub fn into_option(self) -> Option<String> {
        match self {
            Self::Hit(v) => Some(v),
            Self::Miss => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Abstracts the fast cache (session snapshots, blacklist sentinels, lockout
/// flags, failure counters, rate-limit windows, MFA setup/challenge payloads,
/// effective-permission snapshots, role details, dashboard summaries).
///
/// Implementations MUST treat unavailability as a recoverable condition:
/// callers fall back to the store on `Err`, never propagate it as a hard
/// failure (§4.F "graceful degradation").
#[async_trait]
pub trait FastCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key with the given prefix (used by `logoutAllDevices` to
    /// drop `session:{id}` entries in bulk).
    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError>;

    /// Atomically increment an integer counter, creating it with the given TTL
    /// if absent, and return the new value. Used for `login:failures:{userId}`.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64, CacheError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheError(pub String);

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cache error: {}", self.0)
    }
}

impl std::error::Error for CacheError {}

/// Cache key conventions from spec.md §6, centralised so no call site hand-rolls
/// a `format!` with a typo-prone prefix.
pub mod keys {
    pub fn session(session_id: &str) -> String {
        format!("session:{session_id}")
    }

    pub fn blacklist(token_hash: &str) -> String {
        format!("blacklist:{token_hash}")
    }

    pub fn account_locked(user_id: &str) -> String {
        format!("account:locked:{user_id}")
    }

    pub fn login_failures(user_id: &str) -> String {
        format!("login:failures:{user_id}")
    }

    pub fn ratelimit_login_email(email_lower: &str) -> String {
        format!("ratelimit:login:email:{email_lower}")
    }

    pub fn ratelimit_login_ip(ip: &str) -> String {
        format!("ratelimit:login:ip:{ip}")
    }

    pub fn mfa_setup(setup_token: &str) -> String {
        format!("mfa:setup:{setup_token}")
    }

    pub fn mfa_challenge(challenge_id: &str) -> String {
        format!("mfa:challenge:{challenge_id}")
    }

    pub fn effective_permissions(user_id: &str) -> String {
        format!("user:effperm:{user_id}")
    }

    pub fn role(role_id: &str) -> String {
        format!("role:{role_id}")
    }

    pub fn dashboard_summary() -> &'static str {
        "security:dashboard:summary"
    }
}
