//! Route policies: which strategy and partition govern a class of request.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PartitionKind;
use crate::request::{Destination, ProxyRequest};

/// Caching strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Store hit wins; network only on miss.
    CacheFirst,
    /// Network wins; store only on failure.
    NetworkFirst,
    /// Serve the store immediately, refresh in the background.
    StaleWhileRevalidate,
    /// Network-first with a TTL-bounded store fallback.
    ApiCache,
    /// Cache-first with a size cap and a placeholder on failure.
    ImageCache,
    /// Cache-first with a long informational TTL.
    FontCache,
}

impl StrategyKind {
    /// Get the name of this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CacheFirst => "cache-first",
            Self::NetworkFirst => "network-first",
            Self::StaleWhileRevalidate => "stale-while-revalidate",
            Self::ApiCache => "api-cache",
            Self::ImageCache => "image-cache",
            Self::FontCache => "font-cache",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification category.
///
/// Categories are evaluated in declaration order; the first category with a
/// matching policy governs the request regardless of where its policies sit
/// in the configured list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    FontExtension,
    ImageExtension,
    MediaDestination,
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
}

impl RouteCategory {
    /// Check whether a matcher is valid for this category.
    pub fn accepts(&self, matcher: &RouteMatcher) -> bool {
        match self {
            Self::FontExtension | Self::ImageExtension => {
                matches!(matcher, RouteMatcher::Extension(_))
            }
            Self::MediaDestination => matches!(matcher, RouteMatcher::Destination(_)),
            Self::NetworkFirst | Self::CacheFirst | Self::StaleWhileRevalidate => {
                matches!(matcher, RouteMatcher::PathPrefix(_))
            }
        }
    }
}

/// Predicate over a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RouteMatcher {
    /// File extension of the last path segment (case-insensitive, no dot).
    Extension(Vec<String>),
    /// Declared request destination.
    Destination(Destination),
    /// Path prefix.
    PathPrefix(String),
}

impl RouteMatcher {
    /// Create an extension matcher.
    pub fn extensions(exts: &[&str]) -> Self {
        Self::Extension(exts.iter().map(|e| e.to_ascii_lowercase()).collect())
    }

    /// Create a path prefix matcher.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::PathPrefix(prefix.into())
    }

    /// Check if the request matches.
    pub fn matches(&self, request: &ProxyRequest) -> bool {
        match self {
            Self::Extension(exts) => path_extension(request.path())
                .map(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext)))
                .unwrap_or(false),
            Self::Destination(dest) => request.destination == *dest,
            Self::PathPrefix(prefix) => request.path().starts_with(prefix.as_str()),
        }
    }
}

/// Extension of the last path segment, if it has one.
fn path_extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Priority category.
    pub category: RouteCategory,
    /// Request predicate.
    pub matcher: RouteMatcher,
    /// Strategy to run.
    pub strategy: StrategyKind,
    /// Partition the strategy reads and writes.
    pub partition: PartitionKind,
    /// Staleness bound (api cache) or informational lifetime (font cache).
    #[serde(default, with = "crate::serde_secs::option", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
    /// Entry cap for the partition, enforced after each write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl RoutePolicy {
    /// Create a new policy.
    pub fn new(
        category: RouteCategory,
        matcher: RouteMatcher,
        strategy: StrategyKind,
        partition: PartitionKind,
    ) -> Self {
        Self {
            category,
            matcher,
            strategy,
            partition,
            ttl: None,
            max_entries: None,
        }
    }

    /// Font files by extension.
    pub fn font_extensions(exts: &[&str]) -> Self {
        Self::new(
            RouteCategory::FontExtension,
            RouteMatcher::extensions(exts),
            StrategyKind::FontCache,
            PartitionKind::Font,
        )
    }

    /// Image files by extension.
    pub fn image_extensions(exts: &[&str]) -> Self {
        Self::new(
            RouteCategory::ImageExtension,
            RouteMatcher::extensions(exts),
            StrategyKind::ImageCache,
            PartitionKind::Image,
        )
    }

    /// Requests by declared destination.
    pub fn destination(
        destination: Destination,
        strategy: StrategyKind,
        partition: PartitionKind,
    ) -> Self {
        Self::new(
            RouteCategory::MediaDestination,
            RouteMatcher::Destination(destination),
            strategy,
            partition,
        )
    }

    /// Network-first prefix with unconditional store fallback.
    pub fn network_first(prefix: &str) -> Self {
        Self::new(
            RouteCategory::NetworkFirst,
            RouteMatcher::prefix(prefix),
            StrategyKind::NetworkFirst,
            PartitionKind::Runtime,
        )
    }

    /// Network-first prefix with a TTL-bounded store fallback.
    pub fn api(prefix: &str, ttl: Duration) -> Self {
        Self::new(
            RouteCategory::NetworkFirst,
            RouteMatcher::prefix(prefix),
            StrategyKind::ApiCache,
            PartitionKind::Api,
        )
        .with_ttl(ttl)
    }

    /// Cache-first prefix for static assets.
    pub fn cache_first(prefix: &str) -> Self {
        Self::new(
            RouteCategory::CacheFirst,
            RouteMatcher::prefix(prefix),
            StrategyKind::CacheFirst,
            PartitionKind::Static,
        )
    }

    /// Stale-while-revalidate prefix.
    pub fn stale_while_revalidate(prefix: &str) -> Self {
        Self::new(
            RouteCategory::StaleWhileRevalidate,
            RouteMatcher::prefix(prefix),
            StrategyKind::StaleWhileRevalidate,
            PartitionKind::Runtime,
        )
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the entry cap.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Check if the request matches this policy's predicate.
    pub fn matches(&self, request: &ProxyRequest) -> bool {
        self.matcher.matches(request)
    }
}
