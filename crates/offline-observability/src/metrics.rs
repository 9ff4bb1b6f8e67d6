//! Proxy counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters shared by every request a proxy instance handles.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    network_fetches: AtomicU64,
    network_failures: AtomicU64,
    stale_served: AtomicU64,
    fallbacks_served: AtomicU64,
    evictions: AtomicU64,
    pass_through: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_fetches: u64,
    pub network_failures: u64,
    /// Store entries served because the network failed or timed out.
    pub stale_served: u64,
    pub fallbacks_served: u64,
    pub evictions: u64,
    pub pass_through: u64,
}

impl ProxyMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_failure(&self) {
        self.network_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_pass_through(&self) {
        self.pass_through.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            network_failures: self.network_failures.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            fallbacks_served: self.fallbacks_served.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pass_through: self.pass_through.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Share of cache lookups that hit, in percent.
    pub fn hit_ratio(&self) -> Option<f64> {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            None
        } else {
            Some(self.cache_hits as f64 * 100.0 / lookups as f64)
        }
    }

    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Generate a human-readable summary.
    pub fn to_summary(&self) -> String {
        let ratio = self
            .hit_ratio()
            .map(|r| format!("{:.1}%", r))
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            "hits={} misses={} (hit ratio {}) fetches={} failures={} stale={} fallbacks={} evictions={} pass-through={}",
            self.cache_hits,
            self.cache_misses,
            ratio,
            self.network_fetches,
            self.network_failures,
            self.stale_served,
            self.fallbacks_served,
            self.evictions,
            self.pass_through
        )
    }
}
