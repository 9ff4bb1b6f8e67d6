//! In-memory backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use offline_core::CacheKey;
use tokio::sync::RwLock;

use crate::backend::StoreBackend;
use crate::entry::CachedEntry;
use crate::error::StoreResult;

/// One partition: entries plus their write order.
#[derive(Debug, Default)]
struct Partition {
    entries: HashMap<CacheKey, (u64, CachedEntry)>,
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
}

impl Partition {
    fn insert(&mut self, key: &CacheKey, entry: CachedEntry) {
        // Overwrite moves the key to the back of the order.
        self.remove(key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key.clone(), (seq, entry));
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some((seq, _)) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    fn keys(&self) -> Vec<CacheKey> {
        self.order.values().cloned().collect()
    }

    fn entries(&self) -> Vec<(CacheKey, CachedEntry)> {
        self.order
            .values()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .map(|(_, entry)| (key.clone(), entry.clone()))
            })
            .collect()
    }
}

/// Process-local backend holding every partition in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    partitions: RwLock<BTreeMap<String, Partition>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn open(&self, partition: &str) -> StoreResult<()> {
        let mut partitions = self.partitions.write().await;
        partitions.entry(partition.to_string()).or_default();
        Ok(())
    }

    async fn has(&self, partition: &str) -> StoreResult<bool> {
        Ok(self.partitions.read().await.contains_key(partition))
    }

    async fn get(&self, partition: &str, key: &CacheKey) -> StoreResult<Option<CachedEntry>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .and_then(|p| p.entries.get(key))
            .map(|(_, entry)| entry.clone()))
    }

    async fn put(&self, partition: &str, key: &CacheKey, entry: CachedEntry) -> StoreResult<()> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(key, entry);
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &CacheKey) -> StoreResult<bool> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions
            .get_mut(partition)
            .map(|p| p.remove(key))
            .unwrap_or(false))
    }

    async fn keys(&self, partition: &str) -> StoreResult<Vec<CacheKey>> {
        let partitions = self.partitions.read().await;
        Ok(partitions.get(partition).map(Partition::keys).unwrap_or_default())
    }

    async fn entries(&self, partition: &str) -> StoreResult<Vec<(CacheKey, CachedEntry)>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .map(Partition::entries)
            .unwrap_or_default())
    }

    async fn delete_store(&self, partition: &str) -> StoreResult<bool> {
        Ok(self.partitions.write().await.remove(partition).is_some())
    }

    async fn store_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.partitions.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_core::ProxyResponse;
    use url::Url;

    fn key(path: &str) -> CacheKey {
        CacheKey::get(&Url::parse(&format!("https://shop.example{}", path)).unwrap())
    }

    fn entry(body: &str) -> CachedEntry {
        CachedEntry::from_response(&ProxyResponse::ok(body))
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let backend = MemoryBackend::new();
        assert!(!backend.has("runtime").await.unwrap());

        backend.open("runtime").await.unwrap();
        backend.put("runtime", &key("/a"), entry("a")).await.unwrap();
        backend.open("runtime").await.unwrap();

        assert!(backend.has("runtime").await.unwrap());
        assert_eq!(backend.keys("runtime").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_creates_partition_lazily() {
        let backend = MemoryBackend::new();
        backend.put("image", &key("/a.png"), entry("a")).await.unwrap();
        assert_eq!(backend.store_names().await.unwrap(), vec!["image".to_string()]);
    }

    #[tokio::test]
    async fn test_put_overwrites_and_moves_to_back() {
        let backend = MemoryBackend::new();
        backend.put("p", &key("/a"), entry("a1")).await.unwrap();
        backend.put("p", &key("/b"), entry("b")).await.unwrap();
        backend.put("p", &key("/a"), entry("a2")).await.unwrap();

        assert_eq!(backend.keys("p").await.unwrap(), vec![key("/b"), key("/a")]);
        let a = backend.get("p", &key("/a")).await.unwrap().unwrap();
        assert_eq!(a.body, b"a2");
    }

    #[tokio::test]
    async fn test_keys_in_insertion_order() {
        let backend = MemoryBackend::new();
        for i in 0..20 {
            backend
                .put("p", &key(&format!("/{}", i)), entry("x"))
                .await
                .unwrap();
        }
        let keys = backend.keys("p").await.unwrap();
        let expected: Vec<CacheKey> = (0..20).map(|i| key(&format!("/{}", i))).collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn test_delete_entry_and_store() {
        let backend = MemoryBackend::new();
        backend.put("p", &key("/a"), entry("a")).await.unwrap();

        assert!(backend.delete("p", &key("/a")).await.unwrap());
        assert!(!backend.delete("p", &key("/a")).await.unwrap());
        assert!(!backend.delete("missing", &key("/a")).await.unwrap());

        assert!(backend.delete_store("p").await.unwrap());
        assert!(!backend.delete_store("p").await.unwrap());
        assert!(backend.get("p", &key("/a")).await.unwrap().is_none());
    }
}
