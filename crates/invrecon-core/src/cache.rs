//! Ephemeral key-value cache interface.
//!
//! Used for progress snapshots, cancellation flags, and CSV metadata
//! previews. Production deployments back this with an external store; the
//! in-memory implementation here enforces the same TTL semantics.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::ReconResult;

/// Minimal cache contract the core depends on.
pub trait Cache: Send + Sync {
    /// Store a value under a key with a time-to-live.
    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> ReconResult<()>;

    /// Fetch a value if present and not expired.
    fn get(&self, key: &str) -> ReconResult<Option<serde_json::Value>>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> ReconResult<()>;
}

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// In-memory reference cache with expiry checked on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Whether the cache holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> ReconResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> ReconResult<Option<serde_json::Value>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> ReconResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache
            .set("k", serde_json::json!({"v": 1}), Duration::from_secs(60))
            .unwrap();

        assert_eq!(cache.get("k").unwrap(), Some(serde_json::json!({"v": 1})));

        cache.delete("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_expired_entry_is_gone() {
        let cache = MemoryCache::new();
        cache
            .set("k", serde_json::json!(true), Duration::from_millis(0))
            .unwrap();

        assert_eq!(cache.get("k").unwrap(), None);
        assert!(cache.is_empty());
    }
}
