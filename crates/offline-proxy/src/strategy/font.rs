use std::sync::Arc;

use offline_core::{ProxyRequest, ProxyResponse, ProxyResult, StrategyKind};

use super::cache_first;
use crate::classify::RouteDecision;
use crate::context::{Persist, ProxyContext};

/// Cache-first with the route lifetime recorded on the entry. Never revalidated.
pub(super) async fn run(
    ctx: &Arc<ProxyContext>,
    route: &RouteDecision,
    request: &ProxyRequest,
) -> ProxyResult<ProxyResponse> {
    let persist = Persist::new(ctx.partition(route.partition), StrategyKind::FontCache.name())
        .tagged()
        .with_ttl(route.ttl);
    cache_first::serve(ctx, request, persist).await
}
