use std::sync::Arc;
use std::time::Duration;

use offline_core::{ProxyRequest, ProxyResponse, ProxyResult, StrategyKind};
use offline_fetch::{network_error, FetchRequest};
use tracing::debug;

use crate::classify::RouteDecision;
use crate::context::{Persist, ProxyContext};

const DEFAULT_API_TTL: Duration = Duration::from_secs(60);

/// Network-first with a freshness window on the stored copy.
///
/// Successful responses are tagged with their write time, and each write
/// sweeps entries older than the window. On failure only a copy tagged less
/// than the window ago is served.
pub(super) async fn run(
    ctx: &Arc<ProxyContext>,
    route: &RouteDecision,
    request: &ProxyRequest,
) -> ProxyResult<ProxyResponse> {
    let ttl = route.ttl.unwrap_or(DEFAULT_API_TTL);
    let partition = ctx.partition(route.partition);
    let key = request.cache_key();
    let persist = Persist::new(partition.clone(), StrategyKind::ApiCache.name())
        .tagged()
        .with_ttl(Some(ttl))
        .with_sweep(ttl);

    let task = ctx.spawn_fetch_and_persist(FetchRequest::from_proxy(request), key.clone(), persist);
    let error = match ctx.await_with_deadline(task, ctx.config.timeouts.api).await {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };

    match ctx.stored_fallback(&partition, &key, Some(ttl)).await {
        Ok(entry) => {
            debug!(key = %key, error = %error, "Network failed, serving fresh stored copy");
            ctx.metrics.record_stale();
            Ok(entry.to_response())
        }
        Err(miss) if miss.is_store_miss() => {
            debug!(%miss, "No usable API response stored");
            ctx.metrics.record_miss();
            Err(network_error(&request.url, &error))
        }
        Err(e) => Err(e),
    }
}
