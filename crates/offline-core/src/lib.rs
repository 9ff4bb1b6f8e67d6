//! Core types for the offline caching proxy.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `ProxyRequest` / `ProxyResponse` - What crosses the interception boundary
//! - `CacheKey` - Identity of a stored entry
//! - `RoutePolicy` - Ordered (matcher, strategy, partition) tuples
//! - `ProxyConfig` - Immutable configuration handed to a proxy instance
//! - `ProxyError` - Error taxonomy

mod config;
mod error;
mod policy;
mod request;
pub mod serde_secs;

pub use config::*;
pub use error::*;
pub use policy::*;
pub use request::*;
