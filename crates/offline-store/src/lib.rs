//! Partitioned response store for the offline caching proxy.
//!
//! Provides a simple async API over named partitions:
//!
//! ```rust,ignore
//! use offline_store::{CachedEntry, StoreManager};
//!
//! let store = StoreManager::in_memory();
//!
//! // Partitions are created on first write
//! store.put("shop-runtime-v3", &key, CachedEntry::from_response(&response)).await?;
//!
//! // Keys come back in insertion order
//! let keys = store.list_keys("shop-runtime-v3").await?;
//!
//! // Drop a whole partition
//! store.delete_store("shop-runtime-v3").await?;
//! ```

mod backend;
mod entry;
mod error;
mod manager;
mod memory;

pub use backend::StoreBackend;
pub use entry::{CachedEntry, EntryMeta};
pub use error::{StoreError, StoreResult};
pub use manager::StoreManager;
pub use memory::MemoryBackend;
