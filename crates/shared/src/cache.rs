//! Fingerprint cache.
//!
//! A single process-wide, size-bounded cache with per-entry TTLs, keyed
//! by small strings. It memoises indexer gid -> magnet/infohash mappings
//! across requests and collapses duplicate download-url redemptions.
//! A miss is never an error; callers fall through to recompute.

use lru::LruCache;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default byte budget: 50 MiB
pub const DEFAULT_BUDGET_BYTES: usize = 50 * 1024 * 1024;

/// TTL for gid -> magnet/infohash entries
pub const INFOHASH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// TTL for generated download urls
pub const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(5 * 60);

// Rough per-entry bookkeeping overhead added to the byte accounting.
const ENTRY_OVERHEAD: usize = 64;

struct CacheEntry {
    value: String,
    cost: usize,
    expires_at: Instant,
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    used: usize,
    budget: usize,
}

/// Size-bounded TTL cache, safe for concurrent readers and writers
pub struct FingerprintCache {
    inner: Mutex<CacheInner>,
}

impl FingerprintCache {
    /// Create a cache with the given byte budget
    pub fn new(budget: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                used: 0,
                budget,
            }),
        }
    }

    /// Generate a cache key from components
    pub fn make_key(kind: &str, identifier: &str) -> String {
        format!("{}:{}", kind, identifier)
    }

    /// Get a cached value if it exists and hasn't expired
    pub fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                tracing::debug!("Cache hit for key: {}", key);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            tracing::debug!("Cache expired for key: {}", key);
            if let Some(entry) = inner.entries.pop(key) {
                inner.used -= entry.cost;
            }
        } else {
            tracing::debug!("Cache miss for key: {}", key);
        }

        None
    }

    /// Store a value with the given TTL
    pub fn set(&self, key: &str, value: &str, ttl: Duration) {
        let cost = key.len() + value.len() + ENTRY_OVERHEAD;
        let entry = CacheEntry {
            value: value.to_string(),
            cost,
            expires_at: Instant::now() + ttl,
        };

        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if let Some(old) = inner.entries.push(key.to_string(), entry) {
            // push returns the displaced entry when the key already existed
            inner.used -= old.1.cost;
        }
        inner.used += cost;

        // Approximate LRU eviction down to the byte budget
        while inner.used > inner.budget {
            match inner.entries.pop_lru() {
                Some((evicted_key, evicted)) => {
                    tracing::debug!("Evicting cache entry: {}", evicted_key);
                    inner.used -= evicted.cost;
                }
                None => break,
            }
        }
    }
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_roundtrip() {
        let cache = FingerprintCache::default();
        let key = FingerprintCache::make_key("gid", "abc-123");

        assert!(cache.get(&key).is_none());
        cache.set(&key, "magnet:?xt=urn:btih:deadbeef", INFOHASH_TTL);
        assert_eq!(
            cache.get(&key).as_deref(),
            Some("magnet:?xt=urn:btih:deadbeef")
        );
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = FingerprintCache::default();
        cache.set("short", "lived", Duration::from_millis(10));
        assert!(cache.get("short").is_some());

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("short").is_none());
        // a second read stays a miss once the entry is dropped
        assert!(cache.get("short").is_none());
    }

    #[test]
    fn test_byte_budget_eviction() {
        // Budget fits roughly two entries
        let cache = FingerprintCache::new(2 * (ENTRY_OVERHEAD + 10));
        cache.set("a", "1111", Duration::from_secs(60));
        cache.set("b", "2222", Duration::from_secs(60));
        cache.set("c", "3333", Duration::from_secs(60));

        // the least recently used entry was evicted
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_replace_accounts_cost_once() {
        let cache = FingerprintCache::new(10 * (ENTRY_OVERHEAD + 40));
        for _ in 0..100 {
            cache.set("same-key", "same-value-with-some-length", Duration::from_secs(60));
        }
        assert!(cache.get("same-key").is_some());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(FingerprintCache::default());
        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    let key = FingerprintCache::make_key("gid", &format!("{}-{}", i, j));
                    cache.set(&key, "value", INFOHASH_TTL);
                    assert!(cache.get(&key).is_some());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
