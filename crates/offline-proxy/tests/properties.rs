//! End-to-end behaviour of the proxy against a scripted network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use offline_core::{
    CacheKey, Destination, PartitionKind, ProxyConfig, ProxyError, ProxyRequest, ProxyResponse,
    ResponseSource, TimeoutConfig,
};
use offline_fetch::MockFetcher;
use offline_proxy::{
    ControlChannel, ControlCommand, ControlReply, LifecycleState, OfflineProxy, TRANSPARENT_GIF,
};
use offline_store::{
    CachedEntry, EntryMeta, MemoryBackend, StoreBackend, StoreError, StoreManager, StoreResult,
};
use serde_json::json;

fn url(path: &str) -> String {
    format!("https://shop.example{}", path)
}

fn config() -> ProxyConfig {
    ProxyConfig::new("v1", "https://shop.example/".parse().unwrap()).with_precache(vec![])
}

fn get(path: &str) -> ProxyRequest {
    ProxyRequest::parse(Method::GET, &url(path)).unwrap()
}

fn document(path: &str) -> ProxyRequest {
    get(path).with_destination(Destination::Document)
}

async fn started(config: ProxyConfig, fetcher: &Arc<MockFetcher>) -> (OfflineProxy, StoreManager) {
    let store = StoreManager::in_memory();
    let proxy = OfflineProxy::new(config, store.clone(), fetcher.clone()).unwrap();
    proxy.start().await.unwrap();
    (proxy, store)
}

fn key(path: &str) -> CacheKey {
    CacheKey::get(&url(path).parse().unwrap())
}

#[tokio::test]
async fn test_font_fetched_once() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/fonts/inter.woff2"), "font-bytes");
    let (proxy, _) = started(config(), &fetcher).await;

    for i in 0..5 {
        let response = proxy.handle(&get("/fonts/inter.woff2")).await.unwrap();
        assert_eq!(response.text(), "font-bytes");
        if i > 0 {
            assert_eq!(response.source, ResponseSource::Cache);
        }
    }

    assert_eq!(fetcher.calls(&url("/fonts/inter.woff2")), 1);
}

#[tokio::test]
async fn test_image_partition_is_capped() {
    let fetcher = Arc::new(MockFetcher::new());
    for i in 0..60 {
        fetcher.respond_text(&url(&format!("/img/{}.png", i)), "png");
    }
    let (proxy, store) = started(config(), &fetcher).await;

    for i in 0..60 {
        proxy.handle(&get(&format!("/img/{}.png", i))).await.unwrap();
    }

    let partition = proxy.config().partition_name(PartitionKind::Image);
    let keys = store.list_keys(&partition).await.unwrap();
    assert_eq!(keys.len(), 50);
    assert_eq!(keys[0], key("/img/10.png"));
    assert_eq!(keys[49], key("/img/59.png"));
    assert!(store.get(&partition, &key("/img/9.png")).await.unwrap().is_none());
    assert_eq!(proxy.metrics().evictions, 10);
}

#[tokio::test]
async fn test_image_fetch_is_anonymous() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/img/a.png"), "png");
    let (proxy, _) = started(config(), &fetcher).await;

    let request = get("/img/a.png").with_header(header::COOKIE, HeaderValue::from_static("sid=1"));
    proxy.handle(&request).await.unwrap();

    let sent = fetcher.last_request(&url("/img/a.png")).unwrap();
    assert!(sent.headers.get(header::COOKIE).is_none());
}

#[tokio::test]
async fn test_oversized_image_is_served_not_stored() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond(
        &url("/img/huge.jpg"),
        ProxyResponse::ok("jpg").with_header(header::CONTENT_LENGTH, HeaderValue::from_static("3145728")),
    );
    let (proxy, store) = started(config(), &fetcher).await;

    let response = proxy.handle(&get("/img/huge.jpg")).await.unwrap();
    assert_eq!(response.text(), "jpg");

    let partition = proxy.config().partition_name(PartitionKind::Image);
    assert_eq!(store.entry_count(&partition).await.unwrap(), 0);
}

#[tokio::test]
async fn test_image_failure_yields_placeholder() {
    let fetcher = Arc::new(MockFetcher::new());
    let (proxy, _) = started(config(), &fetcher).await;
    fetcher.set_offline(true);

    let response = proxy.handle(&get("/img/missing.png")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type(), Some("image/gif"));
    assert_eq!(response.body, TRANSPARENT_GIF);
    assert_eq!(response.source, ResponseSource::Fallback);
}

#[tokio::test]
async fn test_image_hit_refreshes_in_background() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/img/a.png"), "png");
    let (proxy, _) = started(config(), &fetcher).await;

    proxy.handle(&get("/img/a.png")).await.unwrap();
    let hit = proxy.handle(&get("/img/a.png")).await.unwrap();
    assert_eq!(hit.source, ResponseSource::Cache);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fetcher.calls(&url("/img/a.png")), 2);
}

async fn seed_api_entry(store: &StoreManager, proxy: &OfflineProxy, path: &str, age_secs: i64) {
    let partition = proxy.config().partition_name(PartitionKind::Api);
    let entry = CachedEntry::from_response(&ProxyResponse::ok("old")).with_meta(
        EntryMeta::default().with_cached_at(Utc::now() - chrono::Duration::seconds(age_secs)),
    );
    store.put(&partition, &key(path), entry).await.unwrap();
}

#[tokio::test]
async fn test_stale_api_entry_is_not_served() {
    let fetcher = Arc::new(MockFetcher::new());
    let (proxy, store) = started(config(), &fetcher).await;
    seed_api_entry(&store, &proxy, "/api/cart", 120).await;
    fetcher.set_offline(true);

    let result = proxy.handle(&get("/api/cart")).await;
    assert!(matches!(result, Err(ProxyError::Network { .. })));
}

#[tokio::test]
async fn test_fresh_api_entry_is_served_offline() {
    let fetcher = Arc::new(MockFetcher::new());
    let (proxy, store) = started(config(), &fetcher).await;
    seed_api_entry(&store, &proxy, "/api/cart", 10).await;
    fetcher.set_offline(true);

    let response = proxy.handle(&get("/api/cart")).await.unwrap();
    assert_eq!(response.text(), "old");
    assert_eq!(response.source, ResponseSource::Cache);
}

#[tokio::test]
async fn test_api_write_sweeps_expired_entries() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/api/cart"), "cart");
    let (proxy, store) = started(config(), &fetcher).await;
    seed_api_entry(&store, &proxy, "/api/old", 120).await;

    proxy.handle(&get("/api/cart")).await.unwrap();

    let partition = proxy.config().partition_name(PartitionKind::Api);
    let stored = store.get(&partition, &key("/api/cart")).await.unwrap().unwrap();
    assert!(stored.meta.cached_at.is_some());
    assert!(store.get(&partition, &key("/api/old")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_while_revalidate_serves_then_refreshes() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/products/1"), "v1");
    let (proxy, _) = started(config(), &fetcher).await;

    assert_eq!(proxy.handle(&get("/products/1")).await.unwrap().text(), "v1");

    fetcher
        .respond_text(&url("/products/1"), "v2")
        .delay(&url("/products/1"), Duration::from_millis(50));
    let immediate = proxy.handle(&get("/products/1")).await.unwrap();
    assert_eq!(immediate.text(), "v1");
    assert_eq!(immediate.source, ResponseSource::Cache);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(proxy.handle(&get("/products/1")).await.unwrap().text(), "v2");
}

#[tokio::test]
async fn test_network_first_deadline_serves_store_and_keeps_fetching() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/orders/1"), "o1");
    let config = config().with_timeouts(TimeoutConfig {
        network_first: Duration::from_millis(50),
        api: Duration::from_secs(5),
    });
    let (proxy, store) = started(config, &fetcher).await;

    let first = proxy.handle(&get("/orders/1")).await.unwrap();
    assert_eq!(first.text(), "o1");
    assert_eq!(first.source, ResponseSource::Network);

    fetcher
        .respond_text(&url("/orders/1"), "o2")
        .delay(&url("/orders/1"), Duration::from_millis(300));
    let slow = proxy.handle(&get("/orders/1")).await.unwrap();
    assert_eq!(slow.text(), "o1");
    assert_eq!(slow.source, ResponseSource::Cache);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let partition = proxy.config().partition_name(PartitionKind::Runtime);
    let stored = store.get(&partition, &key("/orders/1")).await.unwrap().unwrap();
    assert_eq!(stored.body, b"o2");
}

#[tokio::test]
async fn test_stale_while_revalidate_miss_propagates_network_error() {
    let fetcher = Arc::new(MockFetcher::new());
    let (proxy, _) = started(config(), &fetcher).await;
    fetcher.set_offline(true);

    let result = proxy.handle(&get("/products/9")).await;
    assert!(matches!(result, Err(ProxyError::Network { .. })));
}

#[tokio::test]
async fn test_network_first_failure_serves_stored_copy() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/orders/1"), "o1");
    let (proxy, _) = started(config(), &fetcher).await;
    proxy.handle(&get("/orders/1")).await.unwrap();
    fetcher.set_offline(true);

    let response = proxy.handle(&get("/orders/1")).await.unwrap();
    assert_eq!(response.text(), "o1");
    assert_eq!(response.source, ResponseSource::Cache);
    assert_eq!(proxy.metrics().stale_served, 1);
}

#[tokio::test]
async fn test_network_first_miss_propagates_network_error() {
    let fetcher = Arc::new(MockFetcher::new());
    let (proxy, _) = started(config(), &fetcher).await;
    fetcher.set_offline(true);

    let result = proxy.handle(&get("/orders/2")).await;
    assert!(matches!(result, Err(ProxyError::Network { .. })));
    assert_eq!(proxy.metrics().cache_misses, 1);
}

#[tokio::test]
async fn test_late_failure_after_deadline_counts_once() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/orders/1"), "o1");
    let config = config().with_timeouts(TimeoutConfig {
        network_first: Duration::from_millis(50),
        api: Duration::from_secs(5),
    });
    let (proxy, _) = started(config, &fetcher).await;
    proxy.handle(&get("/orders/1")).await.unwrap();

    fetcher
        .fail(&url("/orders/1"), "connection reset")
        .delay(&url("/orders/1"), Duration::from_millis(300));
    let response = proxy.handle(&get("/orders/1")).await.unwrap();
    assert_eq!(response.text(), "o1");

    tokio::time::sleep(Duration::from_millis(600)).await;
    let metrics = proxy.metrics();
    assert_eq!(metrics.network_fetches, 2);
    assert_eq!(metrics.network_failures, 1);
}

#[tokio::test]
async fn test_offline_navigation_gets_precached_offline_page() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/offline.html"), "<h1>cached offline</h1>");
    let config = config().with_precache(vec!["/offline.html".to_string()]);
    let (proxy, _) = started(config, &fetcher).await;
    fetcher.set_offline(true);

    let response = proxy.handle(&document("/about")).await.unwrap();
    assert_eq!(response.text(), "<h1>cached offline</h1>");
    assert_eq!(response.source, ResponseSource::Fallback);
}

#[tokio::test]
async fn test_offline_navigation_gets_builtin_page() {
    let fetcher = Arc::new(MockFetcher::new());
    let (proxy, _) = started(config(), &fetcher).await;
    fetcher.set_offline(true);

    let response = proxy.handle(&document("/about")).await.unwrap();
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.source, ResponseSource::Fallback);
    assert_eq!(proxy.metrics().fallbacks_served, 1);
}

#[tokio::test]
async fn test_failed_sub_resource_gets_503() {
    let fetcher = Arc::new(MockFetcher::new());
    let (proxy, _) = started(config(), &fetcher).await;
    fetcher.set_offline(true);

    let response = proxy.handle(&get("/robots.txt")).await.unwrap();
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text(), "Service Unavailable");
}

#[tokio::test]
async fn test_non_success_is_returned_not_stored() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond(&url("/static/gone.js"), ProxyResponse::new(StatusCode::NOT_FOUND, "nope"));
    let (proxy, store) = started(config(), &fetcher).await;

    let response = proxy.handle(&get("/static/gone.js")).await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let partition = proxy.config().partition_name(PartitionKind::Static);
    assert_eq!(store.entry_count(&partition).await.unwrap(), 0);
}

#[tokio::test]
async fn test_post_never_touches_partitions() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/api/cart"), "added");
    let (proxy, store) = started(config(), &fetcher).await;

    let request = ProxyRequest::parse(Method::POST, &url("/api/cart")).unwrap();
    let response = proxy.handle(&request).await.unwrap();

    assert_eq!(response.text(), "added");
    assert!(store.store_names().await.unwrap().is_empty());
    assert_eq!(proxy.metrics().pass_through, 1);
}

#[tokio::test]
async fn test_prefetch_tolerates_invalid_urls() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/products/1"), "p1");
    fetcher.respond_text(&url("/products/2"), "p2");
    let (proxy, store) = started(config(), &fetcher).await;

    let reply = ControlChannel::new(proxy.clone())
        .execute(ControlCommand::PrefetchResources {
            urls: vec![
                "/products/1".to_string(),
                "http://[::1".to_string(),
                "/products/2".to_string(),
            ],
        })
        .await
        .unwrap();

    match reply {
        Some(ControlReply::Prefetched(report)) => {
            assert!(report.success);
            assert_eq!(report.fetched, vec!["/products/1", "/products/2"]);
            assert_eq!(report.failed, vec!["http://[::1"]);
        }
        other => panic!("unexpected reply {:?}", other),
    }

    let partition = proxy.config().partition_name(PartitionKind::Runtime);
    assert_eq!(store.entry_count(&partition).await.unwrap(), 2);
}

#[tokio::test]
async fn test_clear_cache_deletes_partitions() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/static/app.js"), "js");
    let (proxy, store) = started(config(), &fetcher).await;
    proxy.handle(&get("/static/app.js")).await.unwrap();
    assert!(!store.store_names().await.unwrap().is_empty());

    let reply = ControlChannel::new(proxy)
        .execute(ControlCommand::ClearCache)
        .await
        .unwrap();
    assert_eq!(reply, Some(ControlReply::Cleared { success: true }));
    assert!(store.store_names().await.unwrap().is_empty());
}

/// Backend whose image partition can't be inspected.
#[derive(Default)]
struct BrokenImageBackend {
    inner: MemoryBackend,
}

fn broken(partition: &str) -> StoreResult<()> {
    if partition.contains("-image-") {
        Err(StoreError::BackendError("disk unavailable".to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for BrokenImageBackend {
    async fn open(&self, partition: &str) -> StoreResult<()> {
        self.inner.open(partition).await
    }

    async fn has(&self, partition: &str) -> StoreResult<bool> {
        broken(partition)?;
        self.inner.has(partition).await
    }

    async fn get(&self, partition: &str, key: &CacheKey) -> StoreResult<Option<CachedEntry>> {
        self.inner.get(partition, key).await
    }

    async fn put(&self, partition: &str, key: &CacheKey, entry: CachedEntry) -> StoreResult<()> {
        self.inner.put(partition, key, entry).await
    }

    async fn delete(&self, partition: &str, key: &CacheKey) -> StoreResult<bool> {
        self.inner.delete(partition, key).await
    }

    async fn keys(&self, partition: &str) -> StoreResult<Vec<CacheKey>> {
        broken(partition)?;
        self.inner.keys(partition).await
    }

    async fn entries(&self, partition: &str) -> StoreResult<Vec<(CacheKey, CachedEntry)>> {
        self.inner.entries(partition).await
    }

    async fn delete_store(&self, partition: &str) -> StoreResult<bool> {
        self.inner.delete_store(partition).await
    }

    async fn store_names(&self) -> StoreResult<Vec<String>> {
        self.inner.store_names().await
    }
}

#[tokio::test]
async fn test_stats_report_errors_per_partition() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.respond_text(&url("/static/app.js"), "js");
    let store = StoreManager::new(Arc::new(BrokenImageBackend::default()));
    let proxy = OfflineProxy::new(config(), store, fetcher.clone()).unwrap();
    proxy.start().await.unwrap();
    proxy.handle(&get("/static/app.js")).await.unwrap();

    let reply = ControlChannel::new(proxy.clone())
        .execute(ControlCommand::CacheStats)
        .await
        .unwrap();
    let stats = match reply {
        Some(ControlReply::Stats(stats)) => stats,
        other => panic!("unexpected reply {:?}", other),
    };

    assert_eq!(stats.len(), 5);
    let static_stats = &stats[&proxy.config().partition_name(PartitionKind::Static)];
    assert!(static_stats.exists);
    assert_eq!(static_stats.entry_count, 1);

    let image_stats = &stats[&proxy.config().partition_name(PartitionKind::Image)];
    assert!(!image_stats.exists);
    assert_eq!(image_stats.entry_count, 0);
    assert!(image_stats.error.is_some());
}

#[tokio::test]
async fn test_control_loop_replies() {
    let fetcher = Arc::new(MockFetcher::new());
    let proxy = OfflineProxy::new(config(), StoreManager::in_memory(), fetcher.clone()).unwrap();
    proxy.install().await.unwrap();
    assert_eq!(proxy.state(), LifecycleState::Waiting);

    let (handle, _task) = ControlChannel::new(proxy.clone()).spawn(8);

    let reply = handle.request(json!({"type": "SKIP_WAITING"})).await.unwrap();
    assert!(reply.is_none());
    assert_eq!(proxy.state(), LifecycleState::Active);

    let stats = handle
        .request(json!({"type": "CACHE_STATS"}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats["shop-static-v1"], json!({"entryCount": 0, "exists": false}));

    assert!(handle.request(json!({"type": "SELF_DESTRUCT"})).await.unwrap().is_none());
}

/// Backend whose partition listing is slow and counted.
#[derive(Default)]
struct SlowListingBackend {
    inner: MemoryBackend,
    listings: AtomicUsize,
}

#[async_trait]
impl StoreBackend for SlowListingBackend {
    async fn open(&self, partition: &str) -> StoreResult<()> {
        self.inner.open(partition).await
    }

    async fn has(&self, partition: &str) -> StoreResult<bool> {
        self.inner.has(partition).await
    }

    async fn get(&self, partition: &str, key: &CacheKey) -> StoreResult<Option<CachedEntry>> {
        self.inner.get(partition, key).await
    }

    async fn put(&self, partition: &str, key: &CacheKey, entry: CachedEntry) -> StoreResult<()> {
        self.inner.put(partition, key, entry).await
    }

    async fn delete(&self, partition: &str, key: &CacheKey) -> StoreResult<bool> {
        self.inner.delete(partition, key).await
    }

    async fn keys(&self, partition: &str) -> StoreResult<Vec<CacheKey>> {
        self.inner.keys(partition).await
    }

    async fn entries(&self, partition: &str) -> StoreResult<Vec<(CacheKey, CachedEntry)>> {
        self.inner.entries(partition).await
    }

    async fn delete_store(&self, partition: &str) -> StoreResult<bool> {
        self.inner.delete_store(partition).await
    }

    async fn store_names(&self) -> StoreResult<Vec<String>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.store_names().await
    }
}

#[tokio::test]
async fn test_concurrent_skip_waiting_activates_once() {
    let backend = Arc::new(SlowListingBackend::default());
    let store = StoreManager::new(backend.clone());
    let proxy = OfflineProxy::new(config(), store, Arc::new(MockFetcher::new())).unwrap();
    proxy.install().await.unwrap();
    assert_eq!(proxy.state(), LifecycleState::Waiting);

    let (first, second) = tokio::join!(proxy.skip_waiting(), proxy.skip_waiting());
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(proxy.state(), LifecycleState::Active);
    assert_eq!(backend.listings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_control_skip_waiting_races_install() {
    let proxy = OfflineProxy::new(
        config(),
        StoreManager::new(Arc::new(SlowListingBackend::default())),
        Arc::new(MockFetcher::new()),
    )
    .unwrap();
    let channel = ControlChannel::new(proxy.clone());

    let skip_waiting = json!({"type": "SKIP_WAITING"});
    let (installed, _) = tokio::join!(proxy.start(), channel.handle_message(&skip_waiting));
    installed.unwrap();
    assert_eq!(proxy.state(), LifecycleState::Active);
}
