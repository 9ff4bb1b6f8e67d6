//! Store manager: partition operations plus eviction helpers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use offline_core::CacheKey;
use tracing::{debug, warn};

use crate::backend::StoreBackend;
use crate::entry::CachedEntry;
use crate::error::StoreResult;
use crate::memory::MemoryBackend;

/// Handle to partitioned storage.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct StoreManager {
    backend: Arc<dyn StoreBackend>,
}

impl StoreManager {
    /// Create a manager over a backend.
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Create a manager over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Create the partition if needed.
    pub async fn open(&self, partition: &str) -> StoreResult<()> {
        self.backend.open(partition).await
    }

    /// Check whether a partition exists.
    pub async fn has(&self, partition: &str) -> StoreResult<bool> {
        self.backend.has(partition).await
    }

    /// Get an entry.
    pub async fn get(&self, partition: &str, key: &CacheKey) -> StoreResult<Option<CachedEntry>> {
        self.backend.get(partition, key).await
    }

    /// Store an entry, replacing any existing one.
    pub async fn put(&self, partition: &str, key: &CacheKey, entry: CachedEntry) -> StoreResult<()> {
        debug!(partition, key = %key, size = entry.size(), "Storing entry");
        self.backend.put(partition, key, entry).await
    }

    /// Delete an entry.
    pub async fn delete(&self, partition: &str, key: &CacheKey) -> StoreResult<bool> {
        self.backend.delete(partition, key).await
    }

    /// Keys in insertion order.
    pub async fn list_keys(&self, partition: &str) -> StoreResult<Vec<CacheKey>> {
        self.backend.keys(partition).await
    }

    /// Drop a whole partition.
    pub async fn delete_store(&self, partition: &str) -> StoreResult<bool> {
        self.backend.delete_store(partition).await
    }

    /// Names of all existing partitions.
    pub async fn store_names(&self) -> StoreResult<Vec<String>> {
        self.backend.store_names().await
    }

    /// Number of entries in a partition.
    pub async fn entry_count(&self, partition: &str) -> StoreResult<usize> {
        Ok(self.backend.keys(partition).await?.len())
    }

    /// Lookup that degrades backend failures to a miss.
    pub async fn lookup(&self, partition: &str, key: &CacheKey) -> Option<CachedEntry> {
        match self.backend.get(partition, key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(partition, key = %key, error = %e, "Store lookup failed, treating as miss");
                None
            }
        }
    }

    /// Write that degrades backend failures to a warning. Returns whether it stored.
    pub async fn store(&self, partition: &str, key: &CacheKey, entry: CachedEntry) -> bool {
        match self.put(partition, key, entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!(partition, key = %key, error = %e, "Failed to store entry");
                false
            }
        }
    }

    /// Evict the oldest-inserted entries beyond `max_entries`.
    ///
    /// Returns the number evicted. Failures are logged, never raised.
    pub async fn evict_oldest(&self, partition: &str, max_entries: usize) -> usize {
        let keys = match self.backend.keys(partition).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(partition, error = %e, "Failed to list keys for eviction");
                return 0;
            }
        };

        if keys.len() <= max_entries {
            return 0;
        }

        let excess = keys.len() - max_entries;
        let mut evicted = 0;
        for key in keys.iter().take(excess) {
            match self.backend.delete(partition, key).await {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                Err(e) => warn!(partition, key = %key, error = %e, "Failed to evict entry"),
            }
        }

        debug!(partition, evicted, max_entries, "Evicted oldest entries");
        evicted
    }

    /// Delete entries whose cached-at tag is `ttl` or more before `now`.
    ///
    /// Untagged entries are treated as expired. Returns the number removed.
    pub async fn sweep_expired(&self, partition: &str, ttl: Duration, now: DateTime<Utc>) -> usize {
        let entries = match self.backend.entries(partition).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(partition, error = %e, "Failed to read entries for TTL sweep");
                return 0;
            }
        };

        let mut removed = 0;
        for (key, entry) in entries {
            if entry.is_fresh(ttl, now) {
                continue;
            }
            match self.backend.delete(partition, &key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(partition, key = %key, error = %e, "Failed to sweep entry"),
            }
        }

        if removed > 0 {
            debug!(partition, removed, ttl_secs = ttl.as_secs(), "Swept expired entries");
        }
        removed
    }
}

impl std::fmt::Debug for StoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryMeta;
    use offline_core::ProxyResponse;
    use url::Url;

    fn key(i: usize) -> CacheKey {
        CacheKey::get(&Url::parse(&format!("https://shop.example/img/{}.png", i)).unwrap())
    }

    fn entry() -> CachedEntry {
        CachedEntry::from_response(&ProxyResponse::ok("x"))
    }

    #[tokio::test]
    async fn test_evict_oldest_keeps_newest() {
        let store = StoreManager::in_memory();
        for i in 0..60 {
            store.put("image", &key(i), entry()).await.unwrap();
        }

        let evicted = store.evict_oldest("image", 50).await;
        assert_eq!(evicted, 10);

        let keys = store.list_keys("image").await.unwrap();
        assert_eq!(keys.len(), 50);
        assert_eq!(keys.first(), Some(&key(10)));
        assert_eq!(keys.last(), Some(&key(59)));
    }

    #[tokio::test]
    async fn test_evict_under_cap_is_noop() {
        let store = StoreManager::in_memory();
        store.put("image", &key(0), entry()).await.unwrap();
        assert_eq!(store.evict_oldest("image", 50).await, 0);
        assert_eq!(store.evict_oldest("missing", 50).await, 0);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let store = StoreManager::in_memory();
        let now = Utc::now();
        let ttl = Duration::from_secs(60);

        let old = entry().with_meta(EntryMeta::default().with_cached_at(now - chrono::Duration::seconds(90)));
        let fresh = entry().with_meta(EntryMeta::default().with_cached_at(now - chrono::Duration::seconds(5)));
        store.put("api", &key(1), old).await.unwrap();
        store.put("api", &key(2), fresh).await.unwrap();
        store.put("api", &key(3), entry()).await.unwrap();

        assert_eq!(store.sweep_expired("api", ttl, now).await, 2);
        assert_eq!(store.list_keys("api").await.unwrap(), vec![key(2)]);
    }

    #[tokio::test]
    async fn test_entry_count_of_missing_partition_is_zero() {
        let store = StoreManager::in_memory();
        assert_eq!(store.entry_count("nope").await.unwrap(), 0);
        assert!(!store.has("nope").await.unwrap());
    }
}
