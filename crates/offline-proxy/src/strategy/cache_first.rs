use std::sync::Arc;

use offline_core::{ProxyRequest, ProxyResponse, ProxyResult, StrategyKind};
use offline_fetch::{network_error, FetchRequest};
use tracing::{debug, warn};

use crate::classify::RouteDecision;
use crate::context::{Persist, ProxyContext};
use crate::fallback::FallbackKind;

pub(super) async fn run(
    ctx: &Arc<ProxyContext>,
    route: &RouteDecision,
    request: &ProxyRequest,
) -> ProxyResult<ProxyResponse> {
    let persist = Persist::new(ctx.partition(route.partition), StrategyKind::CacheFirst.name());
    serve(ctx, request, persist).await
}

/// Store first; on a miss fetch, persist on success, and return.
///
/// A failed navigation surfaces the network error; any other failed request
/// gets a synthesized 503.
pub(super) async fn serve(
    ctx: &ProxyContext,
    request: &ProxyRequest,
    persist: Persist,
) -> ProxyResult<ProxyResponse> {
    let key = request.cache_key();

    if let Some(entry) = ctx.store.lookup(&persist.partition, &key).await {
        ctx.metrics.record_hit();
        debug!(key = %key, partition = %persist.partition, "Cache hit");
        return Ok(entry.to_response());
    }
    ctx.metrics.record_miss();

    match ctx
        .fetch_and_persist(&FetchRequest::from_proxy(request), &key, &persist)
        .await
    {
        Ok(response) => Ok(response),
        Err(e) if request.is_navigation() => Err(network_error(&request.url, &e)),
        Err(e) => {
            warn!(url = %request.url, error = %e, "Cache miss and network failed");
            ctx.metrics.record_fallback();
            Ok(FallbackKind::ServiceUnavailable.response())
        }
    }
}
