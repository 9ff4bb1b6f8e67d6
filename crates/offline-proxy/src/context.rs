//! Shared state for request handlers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use offline_core::{CacheKey, PartitionKind, ProxyConfig, ProxyError, ProxyResponse, ProxyResult};
use offline_fetch::{detach_on_deadline, FetchError, FetchRequest, Fetcher};
use offline_observability::ProxyMetrics;
use offline_store::{CachedEntry, EntryMeta, StoreManager};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::classify::RouteTable;

/// How a fetched response is written back to a partition.
#[derive(Debug, Clone)]
pub(crate) struct Persist {
    pub partition: String,
    pub strategy: &'static str,
    /// Tag entries with the write time.
    pub tag_cached_at: bool,
    /// Informational lifetime recorded on the entry.
    pub ttl: Option<Duration>,
    /// Skip responses whose declared size isn't under this.
    pub max_entry_bytes: Option<u64>,
    /// Evict oldest entries beyond this after the write.
    pub max_entries: Option<usize>,
    /// Sweep entries older than this after the write.
    pub sweep_after: Option<Duration>,
}

impl Persist {
    pub fn new(partition: impl Into<String>, strategy: &'static str) -> Self {
        Self {
            partition: partition.into(),
            strategy,
            tag_cached_at: false,
            ttl: None,
            max_entry_bytes: None,
            max_entries: None,
            sweep_after: None,
        }
    }

    pub fn tagged(mut self) -> Self {
        self.tag_cached_at = true;
        self
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entry_bytes(mut self, limit: u64) -> Self {
        self.max_entry_bytes = Some(limit);
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn with_sweep(mut self, ttl: Duration) -> Self {
        self.sweep_after = Some(ttl);
        self
    }

    fn meta(&self) -> EntryMeta {
        let mut meta = if self.tag_cached_at {
            EntryMeta::cached_now()
        } else {
            EntryMeta::default()
        };
        if let Some(ttl) = self.ttl {
            meta = meta.with_ttl(ttl);
        }
        meta.with_strategy(self.strategy)
    }
}

/// Everything a strategy handler needs.
pub(crate) struct ProxyContext {
    pub config: ProxyConfig,
    pub routes: RouteTable,
    pub store: StoreManager,
    pub fetcher: Arc<dyn Fetcher>,
    pub metrics: ProxyMetrics,
}

impl ProxyContext {
    pub fn new(config: ProxyConfig, store: StoreManager, fetcher: Arc<dyn Fetcher>) -> Self {
        let routes = RouteTable::new(&config.routes);
        Self {
            config,
            routes,
            store,
            fetcher,
            metrics: ProxyMetrics::new(),
        }
    }

    /// Versioned partition name.
    pub fn partition(&self, kind: PartitionKind) -> String {
        self.config.partition_name(kind)
    }

    /// Fetch from the network, counting the attempt.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<ProxyResponse, FetchError> {
        self.metrics.record_fetch();
        let result = self.fetcher.fetch(request).await;
        if let Err(e) = &result {
            self.metrics.record_network_failure();
            debug!(url = %request.url, error = %e, "Network fetch failed");
        }
        result
    }

    /// Write a response back according to `persist`. Returns whether it stored.
    ///
    /// Only 2xx responses are stored.
    pub async fn persist(&self, persist: &Persist, key: &CacheKey, response: &ProxyResponse) -> bool {
        if !response.is_success() {
            debug!(key = %key, status = %response.status, "Not storing non-success response");
            return false;
        }

        if let (Some(limit), Some(size)) = (persist.max_entry_bytes, response.declared_size()) {
            if size >= limit {
                let rejected = ProxyError::SizeRejected {
                    url: key.url().to_string(),
                    size,
                    limit,
                };
                debug!(%rejected, "Not storing oversized response");
                return false;
            }
        }

        let entry = CachedEntry::from_response(response).with_meta(persist.meta());
        if !self.store.store(&persist.partition, key, entry).await {
            return false;
        }

        if let Some(max) = persist.max_entries {
            let evicted = self.store.evict_oldest(&persist.partition, max).await;
            self.metrics.record_evictions(evicted);
        }
        if let Some(ttl) = persist.sweep_after {
            self.store.sweep_expired(&persist.partition, ttl, Utc::now()).await;
        }
        true
    }

    /// Fetch, then write the response back if it qualifies.
    pub async fn fetch_and_persist(
        &self,
        request: &FetchRequest,
        key: &CacheKey,
        persist: &Persist,
    ) -> Result<ProxyResponse, FetchError> {
        let response = self.fetch(request).await?;
        self.persist(persist, key, &response).await;
        Ok(response)
    }

    /// Run [`fetch_and_persist`](Self::fetch_and_persist) as its own task.
    ///
    /// The task outlives the caller if the handle is dropped.
    pub fn spawn_fetch_and_persist(
        self: &Arc<Self>,
        request: FetchRequest,
        key: CacheKey,
        persist: Persist,
    ) -> JoinHandle<Result<ProxyResponse, FetchError>> {
        let ctx = Arc::clone(self);
        tokio::spawn(async move { ctx.fetch_and_persist(&request, &key, &persist).await })
    }

    /// Wait for a spawned fetch for at most `deadline`.
    pub async fn await_with_deadline(
        &self,
        task: JoinHandle<Result<ProxyResponse, FetchError>>,
        deadline: Duration,
    ) -> Result<ProxyResponse, FetchError> {
        let result = detach_on_deadline(task, deadline).await;
        if let Err(FetchError::Timeout(after)) = &result {
            debug!(?after, "Fetch deadline expired, continuing in background");
        }
        result
    }

    /// Stored copy to answer with after a network failure.
    ///
    /// With `max_age`, a copy tagged that long ago or earlier is
    /// [`ProxyError::StaleEntry`]. A missing copy is [`ProxyError::NotFoundInStore`].
    pub async fn stored_fallback(
        &self,
        partition: &str,
        key: &CacheKey,
        max_age: Option<Duration>,
    ) -> ProxyResult<CachedEntry> {
        let entry = self
            .store
            .lookup(partition, key)
            .await
            .ok_or_else(|| ProxyError::NotFoundInStore(key.to_string()))?;

        if let Some(ttl) = max_age {
            let now = Utc::now();
            if !entry.is_fresh(ttl, now) {
                return Err(ProxyError::StaleEntry {
                    url: key.url().to_string(),
                    age_secs: entry.cached_age(now).map(|age| age.as_secs()).unwrap_or(0),
                    ttl_secs: ttl.as_secs(),
                });
            }
        }
        Ok(entry)
    }
}
