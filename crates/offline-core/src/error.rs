//! Error taxonomy for the proxy.

use thiserror::Error;

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors that can surface from the proxy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Fetch failed or its deadline expired.
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// No entry for the key in the consulted partition.
    #[error("not found in store: {0}")]
    NotFoundInStore(String),

    /// Response too large to persist. Never surfaced to the caller.
    #[error("response for {url} too large to persist ({size} bytes, limit {limit})")]
    SizeRejected { url: String, size: u64, limit: u64 },

    /// Entry exists but is past its TTL.
    #[error("stale entry for {url} (age {age_secs}s, ttl {ttl_secs}s)")]
    StaleEntry {
        url: String,
        age_secs: u64,
        ttl_secs: u64,
    },

    /// Control message with an unrecognised type.
    #[error("unknown control command: {0}")]
    UnknownCommand(String),

    /// Lifecycle transition not allowed from the current state.
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Storage backend failure.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid configuration or request descriptor.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Create a network error.
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a network failure.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Check if a store lookup came back empty or unusable.
    ///
    /// Stale entries count as misses for fallback purposes.
    pub fn is_store_miss(&self) -> bool {
        matches!(self, Self::NotFoundInStore(_) | Self::StaleEntry { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_display() {
        let err = ProxyError::network("https://shop.example/api/cart", "connection refused");
        assert_eq!(
            err.to_string(),
            "network error for https://shop.example/api/cart: connection refused"
        );
        assert!(err.is_network());
    }

    #[test]
    fn test_stale_entry_counts_as_store_miss() {
        let stale = ProxyError::StaleEntry {
            url: "https://shop.example/api/cart".to_string(),
            age_secs: 61,
            ttl_secs: 60,
        };
        assert!(stale.is_store_miss());
        assert!(ProxyError::NotFoundInStore("x".to_string()).is_store_miss());
        assert!(!ProxyError::Store("disk full".to_string()).is_store_miss());
    }
}
