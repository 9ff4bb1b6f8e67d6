//! Proxy configuration: route table, partition whitelist and limits.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProxyError;
use crate::policy::{RoutePolicy, StrategyKind};
use crate::request::Destination;

/// The fixed set of partitions known at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    /// Precached static assets and the offline page.
    Static,
    /// Runtime-cached documents and catalog pages.
    Runtime,
    Image,
    Api,
    Font,
}

impl PartitionKind {
    /// All partition kinds.
    pub const ALL: [PartitionKind; 5] = [
        Self::Static,
        Self::Runtime,
        Self::Image,
        Self::Api,
        Self::Font,
    ];

    /// Get the name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Runtime => "runtime",
            Self::Image => "image",
            Self::Api => "api",
            Self::Font => "font",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory fetch deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Deadline for network-first routes.
    #[serde(with = "crate::serde_secs")]
    pub network_first: Duration,
    /// Deadline for api-cache routes.
    #[serde(with = "crate::serde_secs")]
    pub api: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            network_first: Duration::from_secs(3),
            api: Duration::from_secs(5),
        }
    }
}

/// Limits for the image partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLimits {
    /// Entry cap used when an image policy doesn't set one.
    pub max_entries: usize,
    /// Responses declaring a larger size are served but not stored.
    pub max_entry_bytes: u64,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_entry_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Immutable configuration for one proxy instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Cache version; part of every partition name.
    pub version: String,
    /// Prefix for partition names.
    pub cache_prefix: String,
    /// Base URL that relative precache/prefetch URLs resolve against.
    pub scope: Url,
    /// Static assets stored into the primary partition on install.
    #[serde(default)]
    pub precache_urls: Vec<String>,
    /// Document served when a navigation can't be satisfied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_page_url: Option<String>,
    /// Ordered route table.
    pub routes: Vec<RoutePolicy>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub image: ImageLimits,
}

impl ProxyConfig {
    /// Create a configuration with the reference route table.
    pub fn new(version: impl Into<String>, scope: Url) -> Self {
        Self {
            version: version.into(),
            cache_prefix: "shop".to_string(),
            scope,
            precache_urls: vec![
                "/".to_string(),
                "/offline.html".to_string(),
                "/manifest.json".to_string(),
            ],
            offline_page_url: Some("/offline.html".to_string()),
            routes: default_routes(),
            timeouts: TimeoutConfig::default(),
            image: ImageLimits::default(),
        }
    }

    /// Set the partition name prefix.
    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Replace the route table.
    pub fn with_routes(mut self, routes: Vec<RoutePolicy>) -> Self {
        self.routes = routes;
        self
    }

    /// Replace the precache allowlist.
    pub fn with_precache(mut self, urls: Vec<String>) -> Self {
        self.precache_urls = urls;
        self
    }

    /// Set or clear the offline page.
    pub fn with_offline_page(mut self, url: Option<String>) -> Self {
        self.offline_page_url = url;
        self
    }

    /// Set the fetch deadlines.
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the image limits.
    pub fn with_image_limits(mut self, limits: ImageLimits) -> Self {
        self.image = limits;
        self
    }

    /// Versioned name of a partition.
    pub fn partition_name(&self, kind: PartitionKind) -> String {
        format!("{}-{}-{}", self.cache_prefix, kind, self.version)
    }

    /// Names of every partition this version owns.
    pub fn whitelist(&self) -> Vec<String> {
        PartitionKind::ALL
            .iter()
            .map(|kind| self.partition_name(*kind))
            .collect()
    }

    /// Check if a partition name belongs to this version.
    pub fn is_whitelisted(&self, name: &str) -> bool {
        PartitionKind::ALL
            .iter()
            .any(|kind| self.partition_name(*kind) == name)
    }

    /// Resolve a possibly-relative URL against the scope.
    pub fn resolve(&self, url: &str) -> Result<Url, ProxyError> {
        self.scope
            .join(url)
            .map_err(|e| ProxyError::Config(format!("invalid URL '{}': {}", url, e)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.version.trim().is_empty() {
            return Err(ProxyError::Config("version must not be empty".to_string()));
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ProxyError::Config("cache_prefix must not be empty".to_string()));
        }
        if !matches!(self.scope.scheme(), "http" | "https") {
            return Err(ProxyError::Config(format!(
                "scope must be an http(s) URL, got '{}'",
                self.scope
            )));
        }

        if self.timeouts.network_first.is_zero() || self.timeouts.api.is_zero() {
            return Err(ProxyError::Config("timeouts must be non-zero".to_string()));
        }
        if self.image.max_entries == 0 {
            return Err(ProxyError::Config("image.max_entries must be non-zero".to_string()));
        }

        for (index, policy) in self.routes.iter().enumerate() {
            if !policy.category.accepts(&policy.matcher) {
                return Err(ProxyError::Config(format!(
                    "route {}: matcher {:?} is not valid for category {:?}",
                    index, policy.matcher, policy.category
                )));
            }
            if policy.strategy == StrategyKind::ApiCache && policy.ttl.is_none() {
                return Err(ProxyError::Config(format!(
                    "route {}: api-cache routes require a ttl",
                    index
                )));
            }
            if policy.max_entries == Some(0) {
                return Err(ProxyError::Config(format!(
                    "route {}: max_entries must be non-zero",
                    index
                )));
            }
        }

        for url in self.precache_urls.iter().chain(self.offline_page_url.iter()) {
            self.resolve(url)?;
        }

        Ok(())
    }
}

/// The reference route table.
pub fn default_routes() -> Vec<RoutePolicy> {
    const ONE_YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);
    const API_TTL: Duration = Duration::from_secs(60);

    vec![
        RoutePolicy::font_extensions(&["woff", "woff2", "ttf", "otf", "eot"]).with_ttl(ONE_YEAR),
        RoutePolicy::image_extensions(&["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"])
            .with_max_entries(50),
        RoutePolicy::destination(Destination::Image, StrategyKind::ImageCache, PartitionKind::Image)
            .with_max_entries(50),
        RoutePolicy::destination(Destination::Font, StrategyKind::FontCache, PartitionKind::Font)
            .with_ttl(ONE_YEAR),
        RoutePolicy::api("/api/", API_TTL),
        RoutePolicy::network_first("/auth/"),
        RoutePolicy::network_first("/checkout/"),
        RoutePolicy::network_first("/orders/"),
        RoutePolicy::cache_first("/static/"),
        RoutePolicy::cache_first("/assets/"),
        RoutePolicy::cache_first("/_next/static/"),
        RoutePolicy::stale_while_revalidate("/products"),
        RoutePolicy::stale_while_revalidate("/categories"),
        RoutePolicy::stale_while_revalidate("/catalog"),
        RoutePolicy::stale_while_revalidate("/search"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{RouteCategory, RouteMatcher};

    fn config() -> ProxyConfig {
        ProxyConfig::new("v3", Url::parse("https://shop.example/").unwrap())
    }

    #[test]
    fn test_partition_names_are_versioned() {
        let config = config();
        assert_eq!(config.partition_name(PartitionKind::Static), "shop-static-v3");
        assert_eq!(config.partition_name(PartitionKind::Api), "shop-api-v3");
        assert_eq!(config.whitelist().len(), 5);
        assert!(config.is_whitelisted("shop-image-v3"));
        assert!(!config.is_whitelisted("shop-image-v2"));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_version() {
        let mut config = config();
        config.version = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_api_route_without_ttl() {
        let mut policy = RoutePolicy::api("/api/", Duration::from_secs(60));
        policy.ttl = None;
        let config = config().with_routes(vec![policy]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("require a ttl"));
    }

    #[test]
    fn test_validate_rejects_mismatched_matcher() {
        let policy = RoutePolicy::new(
            RouteCategory::FontExtension,
            RouteMatcher::prefix("/fonts/"),
            StrategyKind::FontCache,
            PartitionKind::Font,
        );
        assert!(config().with_routes(vec![policy]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let config = config().with_timeouts(TimeoutConfig {
            network_first: Duration::ZERO,
            api: Duration::from_secs(5),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_relative_url() {
        let config = config();
        assert_eq!(
            config.resolve("/static/app.css").unwrap().as_str(),
            "https://shop.example/static/app.css"
        );
        assert_eq!(
            config.resolve("https://cdn.example/x.js").unwrap().as_str(),
            "https://cdn.example/x.js"
        );
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = config();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("network_first = 3"));

        let back: ProxyConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_sections_default_when_missing() {
        let text = r#"
            version = "v1"
            cache_prefix = "shop"
            scope = "https://shop.example/"
            routes = []
        "#;
        let config: ProxyConfig = toml::from_str(text).unwrap();
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.image.max_entries, 50);
        assert!(config.precache_urls.is_empty());
    }
}
