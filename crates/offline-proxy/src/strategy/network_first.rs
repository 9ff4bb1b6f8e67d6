use std::sync::Arc;

use offline_core::{ProxyRequest, ProxyResponse, ProxyResult, StrategyKind};
use offline_fetch::{network_error, FetchRequest};
use tracing::debug;

use crate::classify::RouteDecision;
use crate::context::{Persist, ProxyContext};

/// Network with a deadline; the stored copy answers only when that fails.
///
/// A fetch that outlives the deadline keeps running and still refreshes the
/// partition when it completes.
pub(super) async fn run(
    ctx: &Arc<ProxyContext>,
    route: &RouteDecision,
    request: &ProxyRequest,
) -> ProxyResult<ProxyResponse> {
    let partition = ctx.partition(route.partition);
    let key = request.cache_key();
    let persist = Persist::new(partition.clone(), StrategyKind::NetworkFirst.name());

    let task = ctx.spawn_fetch_and_persist(FetchRequest::from_proxy(request), key.clone(), persist);
    let error = match ctx
        .await_with_deadline(task, ctx.config.timeouts.network_first)
        .await
    {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };

    match ctx.stored_fallback(&partition, &key, None).await {
        Ok(entry) => {
            debug!(key = %key, error = %error, "Network failed, serving stored copy");
            ctx.metrics.record_stale();
            Ok(entry.to_response())
        }
        Err(miss) if miss.is_store_miss() => {
            debug!(%miss, "No stored copy to fall back on");
            ctx.metrics.record_miss();
            Err(network_error(&request.url, &error))
        }
        Err(e) => Err(e),
    }
}
