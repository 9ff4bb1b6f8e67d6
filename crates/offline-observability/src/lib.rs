//! Observability for the offline caching proxy.
//!
//! This crate provides:
//! - `init_logging` - Install a `tracing` subscriber (human or JSON)
//! - `ProxyMetrics` - Lock-free counters for cache and network outcomes

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
