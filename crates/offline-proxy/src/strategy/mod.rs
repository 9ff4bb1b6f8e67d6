//! Strategy handlers, one per strategy tag.

mod api;
mod cache_first;
mod font;
mod image;
mod network_first;
mod stale_while_revalidate;

use std::sync::Arc;

use offline_core::{ProxyRequest, ProxyResponse, ProxyResult, StrategyKind};
use tracing::debug;

use crate::classify::RouteDecision;
use crate::context::ProxyContext;

/// Run the handler for a route decision.
///
/// A network error is only returned when no stored or synthesized response
/// applies; the caller decides whether a navigation fallback replaces it.
pub(crate) async fn execute(
    ctx: &Arc<ProxyContext>,
    route: &RouteDecision,
    request: &ProxyRequest,
) -> ProxyResult<ProxyResponse> {
    debug!(url = %request.url, strategy = %route.strategy, partition = %route.partition, "Dispatching");

    match route.strategy {
        StrategyKind::CacheFirst => cache_first::run(ctx, route, request).await,
        StrategyKind::NetworkFirst => network_first::run(ctx, route, request).await,
        StrategyKind::StaleWhileRevalidate => stale_while_revalidate::run(ctx, route, request).await,
        StrategyKind::ApiCache => api::run(ctx, route, request).await,
        StrategyKind::ImageCache => image::run(ctx, route, request).await,
        StrategyKind::FontCache => font::run(ctx, route, request).await,
    }
}
