use std::sync::Arc;

use offline_core::{ProxyError, ProxyRequest, ProxyResponse, ProxyResult, StrategyKind};
use offline_fetch::{network_error, FetchRequest};
use tracing::debug;

use crate::classify::RouteDecision;
use crate::context::{Persist, ProxyContext};

/// Serve the stored copy at once and refresh it in the background.
///
/// Without a stored copy the caller waits for the refresh itself.
pub(super) async fn run(
    ctx: &Arc<ProxyContext>,
    route: &RouteDecision,
    request: &ProxyRequest,
) -> ProxyResult<ProxyResponse> {
    let partition = ctx.partition(route.partition);
    let key = request.cache_key();
    let persist = Persist::new(partition.clone(), StrategyKind::StaleWhileRevalidate.name());

    let refresh = ctx.spawn_fetch_and_persist(FetchRequest::from_proxy(request), key.clone(), persist);

    if let Some(entry) = ctx.store.lookup(&partition, &key).await {
        ctx.metrics.record_hit();
        debug!(key = %key, "Serving stored copy, revalidating in background");
        return Ok(entry.to_response());
    }
    ctx.metrics.record_miss();

    match refresh.await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(network_error(&request.url, &e)),
        Err(join_err) => Err(ProxyError::network(
            request.url.as_str(),
            format!("revalidation task failed: {}", join_err),
        )),
    }
}
