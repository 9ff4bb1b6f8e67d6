//! Adaptive caching proxy.
//!
//! Every intercepted request is classified into a strategy tag, and the tag
//! selects a handler that decides between the local partitions and the network:
//! - `RouteTable` - Ordered, category-prioritised classification
//! - `OfflineProxy` - Interception boundary and lifecycle operations
//! - `ControlChannel` - Out-of-band stats, purge and prefetch commands
//! - `Lifecycle` - Installing → Waiting → Active → Redundant
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use offline_core::{ProxyConfig, ProxyRequest};
//! use offline_fetch::HttpFetcher;
//! use offline_proxy::OfflineProxy;
//! use offline_store::StoreManager;
//!
//! let config = ProxyConfig::new("v3", "https://shop.example/".parse()?);
//! let proxy = OfflineProxy::new(config, StoreManager::in_memory(), Arc::new(HttpFetcher::new()))?;
//! proxy.start().await?;
//!
//! let response = proxy.handle(&ProxyRequest::get("https://shop.example/products".parse()?)).await?;
//! ```

mod classify;
mod context;
mod control;
mod fallback;
mod lifecycle;
mod proxy;
mod strategy;

pub use classify::*;
pub use control::*;
pub use fallback::{FallbackKind, TRANSPARENT_GIF};
pub use lifecycle::{InstallReport, Lifecycle, LifecycleState};
pub use proxy::OfflineProxy;
