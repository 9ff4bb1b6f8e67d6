//! Network boundary for the offline caching proxy.
//!
//! This crate provides:
//! - `Fetcher` - The trait every network call goes through
//! - `FetchRequest` - Outbound request with credentials mode
//! - `HttpFetcher` - reqwest-backed implementation
//! - `detach_on_deadline` - Advisory deadlines that never cancel the fetch
//! - `MockFetcher` - Scripted fetcher for tests and local runs

mod client;
mod http_client;
mod mock;
mod timeout;

pub use client::*;
pub use http_client::*;
pub use mock::*;
pub use timeout::*;
