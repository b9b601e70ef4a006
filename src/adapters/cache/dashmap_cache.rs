//! `dashmap`-backed `FastCache` — a single-node, in-process cache used in
//! deployments without Redis, and as the fallback target when the Redis
//! adapter reports unavailability.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::cache::{CacheError, CacheLookup, FastCache};

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct DashmapFastCache {
    entries: DashMap<String, Entry>,
    counters: DashMap<String, Arc<AtomicI64>>,
}

impl DashmapFastCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_expired(entry: &Entry) -> bool {
        Instant::now() >= entry.expires_at
    }
}

#[async_trait::async_trait]
impl FastCache for DashmapFastCache {
    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        match self.entries.get(key) {
            Some(entry) if !Self::is_expired(&entry) => Ok(CacheLookup::Hit(entry.value.clone())),
            Some(_) => {
                self.entries.remove(key);
                Ok(CacheLookup::Miss)
            }
            None => Ok(CacheLookup::Miss),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), Entry { value: value.to_string(), expires_at: Instant::now() + ttl });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        self.counters.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.entries.retain(|k, _| !k.starts_with(prefix));
        self.counters.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }

    async fn increment(&self, key: &str, _ttl: Duration) -> Result<i64, CacheError> {
        let counter = self.counters.entry(key.to_string()).or_insert_with(|| Arc::new(AtomicI64::new(0))).clone();
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = DashmapFastCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), CacheLookup::Hit("v".into()));
    }

    #[tokio::test]
    async fn expired_entries_report_as_a_miss() {
        let cache = DashmapFastCache::new();
        cache.set("k", "v", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn increment_accumulates_per_key() {
        let cache = DashmapFastCache::new();
        assert_eq!(cache.increment("c", Duration::from_secs(60)).await.unwrap(), 1);
        assert_eq!(cache.increment("c", Duration::from_secs(60)).await.unwrap(), 2);
    }
}
