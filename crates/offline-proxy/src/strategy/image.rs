use std::sync::Arc;

use offline_core::{ProxyRequest, ProxyResponse, ProxyResult, StrategyKind};
use offline_fetch::FetchRequest;
use tracing::{debug, warn};

use crate::classify::RouteDecision;
use crate::context::{Persist, ProxyContext};
use crate::fallback::FallbackKind;

/// Cache-first over anonymous fetches with a bounded partition.
///
/// Hits are refreshed in the background. Responses are kept only when their
/// declared size is under the per-entry limit, and every write trims the
/// partition to its cap, oldest first. Total failure yields a placeholder.
pub(super) async fn run(
    ctx: &Arc<ProxyContext>,
    route: &RouteDecision,
    request: &ProxyRequest,
) -> ProxyResult<ProxyResponse> {
    let limits = &ctx.config.image;
    let key = request.cache_key();
    let fetch = FetchRequest::from_proxy(request).anonymous();
    let persist = Persist::new(ctx.partition(route.partition), StrategyKind::ImageCache.name())
        .with_max_entry_bytes(limits.max_entry_bytes)
        .with_max_entries(route.max_entries.unwrap_or(limits.max_entries));

    if let Some(entry) = ctx.store.lookup(&persist.partition, &key).await {
        ctx.metrics.record_hit();
        debug!(key = %key, "Image hit, refreshing in background");
        drop(ctx.spawn_fetch_and_persist(fetch, key, persist));
        return Ok(entry.to_response());
    }
    ctx.metrics.record_miss();

    match ctx.fetch_and_persist(&fetch, &key, &persist).await {
        Ok(response) => Ok(response),
        Err(e) => {
            warn!(url = %request.url, error = %e, "Image unavailable, serving placeholder");
            ctx.metrics.record_fallback();
            Ok(FallbackKind::PlaceholderImage.response())
        }
    }
}
