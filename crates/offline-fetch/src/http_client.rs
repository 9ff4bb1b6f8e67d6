//! reqwest-backed fetcher.

use async_trait::async_trait;
use offline_core::ProxyResponse;
use reqwest::Client;
use tracing::{debug, warn};

use crate::client::{FetchError, FetchRequest, Fetcher};

/// HTTP client for fetching from origin servers.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher with a default client.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<ProxyResponse, FetchError> {
        debug!(method = %request.method, url = %request.url, "Fetching from network");

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| {
                warn!(url = %request.url, error = %e, "Fetch failed");
                if e.is_connect() {
                    FetchError::Connection(e.to_string())
                } else {
                    FetchError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?
            .to_vec();

        debug!(url = %request.url, status = status.as_u16(), size = body.len(), "Fetched");

        Ok(ProxyResponse {
            status,
            headers,
            body,
            source: offline_core::ResponseSource::Network,
        })
    }
}
