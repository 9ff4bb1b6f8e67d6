//! Synthesized responses for requests the network and the store can't answer.

use http::header::{self, HeaderValue};
use http::StatusCode;
use offline_core::{CacheKey, PartitionKind, ProxyResponse, ResponseSource};
use tracing::debug;

use crate::context::ProxyContext;

/// 1×1 transparent GIF.
pub const TRANSPARENT_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

const OFFLINE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Offline</title></head>
<body><h1>You are offline</h1><p>This page isn't available without a connection. Try again once you're back online.</p></body>
</html>
"#;

/// Built-in fallback responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// Offline page for failed navigations (503, HTML).
    OfflinePage,
    /// Placeholder for failed images (200, transparent GIF).
    PlaceholderImage,
    /// Plain 503 for other failed sub-resources.
    ServiceUnavailable,
}

impl FallbackKind {
    /// Build the response.
    pub fn response(&self) -> ProxyResponse {
        let (status, content_type, body): (StatusCode, &'static str, Vec<u8>) = match self {
            Self::OfflinePage => (
                StatusCode::SERVICE_UNAVAILABLE,
                "text/html; charset=utf-8",
                OFFLINE_HTML.as_bytes().to_vec(),
            ),
            Self::PlaceholderImage => (StatusCode::OK, "image/gif", TRANSPARENT_GIF.to_vec()),
            Self::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "text/plain; charset=utf-8",
                b"Service Unavailable".to_vec(),
            ),
        };

        ProxyResponse::new(status, body)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static(content_type))
            .with_header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .with_source(ResponseSource::Fallback)
    }
}

/// Offline page for a failed navigation: the precached copy if present, else the built-in one.
pub(crate) async fn offline_page(ctx: &ProxyContext) -> ProxyResponse {
    let Some(page) = ctx.config.offline_page_url.as_deref() else {
        return FallbackKind::OfflinePage.response();
    };

    let url = match ctx.config.resolve(page) {
        Ok(url) => url,
        Err(e) => {
            debug!(error = %e, "Offline page URL unresolvable, using built-in page");
            return FallbackKind::OfflinePage.response();
        }
    };

    let partition = ctx.partition(PartitionKind::Static);
    match ctx.store.lookup(&partition, &CacheKey::get(&url)).await {
        Some(entry) => entry.to_response().with_source(ResponseSource::Fallback),
        None => FallbackKind::OfflinePage.response(),
    }
}
