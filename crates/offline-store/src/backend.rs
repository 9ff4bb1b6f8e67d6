//! Storage backend trait.

use async_trait::async_trait;
use offline_core::CacheKey;

use crate::entry::CachedEntry;
use crate::error::StoreResult;

/// Partitioned key-value storage.
///
/// Implementations must keep one entry per key per partition and enumerate
/// keys in the order they were last written.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Create the partition if it doesn't exist. Idempotent.
    async fn open(&self, partition: &str) -> StoreResult<()>;

    /// Check whether a partition exists.
    async fn has(&self, partition: &str) -> StoreResult<bool>;

    /// Get an entry. A missing partition reads as empty.
    async fn get(&self, partition: &str, key: &CacheKey) -> StoreResult<Option<CachedEntry>>;

    /// Store an entry, creating the partition and replacing any existing entry.
    async fn put(&self, partition: &str, key: &CacheKey, entry: CachedEntry) -> StoreResult<()>;

    /// Delete an entry. Returns whether it existed.
    async fn delete(&self, partition: &str, key: &CacheKey) -> StoreResult<bool>;

    /// Keys of a partition in insertion order.
    async fn keys(&self, partition: &str) -> StoreResult<Vec<CacheKey>>;

    /// Entries of a partition in insertion order.
    async fn entries(&self, partition: &str) -> StoreResult<Vec<(CacheKey, CachedEntry)>>;

    /// Drop a partition and all its entries. Returns whether it existed.
    async fn delete_store(&self, partition: &str) -> StoreResult<bool>;

    /// Names of all existing partitions.
    async fn store_names(&self) -> StoreResult<Vec<String>>;
}
