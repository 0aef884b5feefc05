//! In-process TTL cache for memoized recommendation result sets
//!
//! The cache is constructed once at startup and handed to the service through
//! its constructor; the background sweeper's lifetime is tied to the guard
//! returned by [`ResultCache::start_sweeper`]. Keys follow the pattern
//! `{user:<id>|anon}:title:<title>:skills:<skills>:...`, so per-user
//! invalidation is a prefix delete.
//!
//! Correctness never depends on the sweeper: `get` enforces expiry on every
//! read and lazily evicts what it finds dead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

/// TTL-keyed store mapping deterministic cache keys to ranked result lists
pub struct ResultCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    default_ttl: Duration,
}

impl<T> Clone for ResultCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            default_ttl: self.default_ttl,
        }
    }
}

/// Aborts the sweep task when dropped
pub struct SweeperHandle(JoinHandle<()>);

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> ResultCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    /// Get a live value. An expired entry counts as a miss and is evicted.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Lazy eviction of the expired entry seen above
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_expired(now) {
                entries.remove(key);
            }
        }
        None
    }

    /// Store a value, overwriting unconditionally. `ttl` defaults to the
    /// cache-wide default when absent.
    pub async fn set(&self, key: &str, value: T, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Delete every key starting with the given literal prefix. A trailing
    /// `*` means "this prefix"; there are no other wildcard semantics.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Invalidated {} cached result sets for prefix {}", removed, prefix);
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Spawn the periodic sweep that proactively removes expired entries.
    /// Dropping the returned handle stops the sweep.
    pub fn start_sweeper(&self, interval: Duration) -> SweeperHandle {
        let entries = Arc::clone(&self.entries);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; skip it so sweeps start one
            // interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let mut entries = entries.write().await;
                let before = entries.len();
                entries.retain(|_, entry| !entry.is_expired(now));
                let removed = before - entries.len();
                if removed > 0 {
                    debug!("Cache sweep removed {} expired entries", removed);
                }
            }
        });
        SweeperHandle(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let cache: ResultCache<Vec<String>> = ResultCache::new(DEFAULT_RESULT_TTL);
        cache
            .set("anon:title:rust engineer", vec!["a".to_string()], None)
            .await;

        let value = cache.get("anon:title:rust engineer").await;
        assert_eq!(value, Some(vec!["a".to_string()]));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache: ResultCache<u32> = ResultCache::new(DEFAULT_RESULT_TTL);
        cache.set("k", 1, None).await;
        cache.set("k", 2, None).await;
        assert_eq!(cache.get("k").await, Some(2));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_gets_evicted() {
        let cache: ResultCache<u32> = ResultCache::new(DEFAULT_RESULT_TTL);
        cache.set("k", 7, Some(Duration::ZERO)).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache: ResultCache<u32> = ResultCache::new(DEFAULT_RESULT_TTL);
        cache.set("k", 1, None).await;
        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_pattern_deletes_by_prefix() {
        let cache: ResultCache<u32> = ResultCache::new(DEFAULT_RESULT_TTL);
        cache.set("user:42:title:a", 1, None).await;
        cache.set("user:42:title:b", 2, None).await;
        cache.set("user:7:title:a", 3, None).await;
        cache.set("anon:title:a", 4, None).await;

        cache.invalidate_pattern("user:42:*").await;

        assert_eq!(cache.get("user:42:title:a").await, None);
        assert_eq!(cache.get("user:42:title:b").await, None);
        assert_eq!(cache.get("user:7:title:a").await, Some(3));
        assert_eq!(cache.get("anon:title:a").await, Some(4));
    }

    #[tokio::test]
    async fn test_invalidate_pattern_without_star_is_plain_prefix() {
        let cache: ResultCache<u32> = ResultCache::new(DEFAULT_RESULT_TTL);
        cache.set("abc", 1, None).await;
        cache.set("abd", 2, None).await;
        cache.invalidate_pattern("ab").await;
        assert_eq!(cache.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache: ResultCache<u32> = ResultCache::new(DEFAULT_RESULT_TTL);
        cache.set("dead", 1, Some(Duration::from_millis(10))).await;
        cache.set("alive", 2, Some(Duration::from_secs(60))).await;

        let _sweeper = cache.start_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;

        // The dead entry went away without any get() touching it
        assert_eq!(cache.entry_count().await, 1);
        assert_eq!(cache.get("alive").await, Some(2));
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_handle_dropped() {
        let cache: ResultCache<u32> = ResultCache::new(DEFAULT_RESULT_TTL);
        let sweeper = cache.start_sweeper(Duration::from_millis(10));
        drop(sweeper);

        cache.set("k", 1, Some(Duration::ZERO)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Entry is expired but still resident; only get() evicts it now
        assert_eq!(cache.entry_count().await, 1);
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.entry_count().await, 0);
    }
}
