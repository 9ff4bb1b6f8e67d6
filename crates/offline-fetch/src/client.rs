//! Fetch trait and outbound request type.

use std::time::Duration;

use async_trait::async_trait;
use http::header::{self, HeaderMap};
use http::Method;
use offline_core::{ProxyError, ProxyRequest, ProxyResponse};
use url::Url;

/// Error type for fetch operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Body error: {0}")]
    Body(String),
}

/// Whether credentials travel with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    /// Send cookies and authorization as given.
    #[default]
    Include,
    /// Strip cookies and authorization.
    Omit,
}

/// An outbound network request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Credentials mode.
    pub credentials: CredentialsMode,
}

impl FetchRequest {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            credentials: CredentialsMode::Include,
        }
    }

    /// Forward an intercepted request as-is.
    pub fn from_proxy(request: &ProxyRequest) -> Self {
        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            credentials: CredentialsMode::Include,
        }
    }

    /// Anonymous, CORS-safe variant: credentials are dropped.
    pub fn anonymous(mut self) -> Self {
        self.credentials = CredentialsMode::Omit;
        self.headers.remove(header::COOKIE);
        self.headers.remove(header::AUTHORIZATION);
        self
    }
}

/// Performs network requests on behalf of the proxy.
///
/// Non-2xx responses are successful fetches; only transport failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch a request.
    async fn fetch(&self, request: &FetchRequest) -> Result<ProxyResponse, FetchError>;
}

/// Convert a fetch failure into the proxy's network error for a URL.
pub fn network_error(url: &Url, err: &FetchError) -> ProxyError {
    ProxyError::network(url.as_str(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_anonymous_strips_credentials() {
        let url = Url::parse("https://cdn.example/a.png").unwrap();
        let mut request = FetchRequest::get(url);
        request
            .headers
            .insert(header::COOKIE, HeaderValue::from_static("session=abc"));
        request
            .headers
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        request
            .headers
            .insert(header::ACCEPT, HeaderValue::from_static("image/*"));

        let anon = request.anonymous();
        assert_eq!(anon.credentials, CredentialsMode::Omit);
        assert!(anon.headers.get(header::COOKIE).is_none());
        assert!(anon.headers.get(header::AUTHORIZATION).is_none());
        assert!(anon.headers.get(header::ACCEPT).is_some());
    }

    #[test]
    fn test_network_error_conversion() {
        let url = Url::parse("https://shop.example/api/cart").unwrap();
        let err = network_error(&url, &FetchError::Timeout(Duration::from_secs(5)));
        assert!(err.is_network());
        assert!(err.to_string().contains("Timeout after 5s"));
    }
}
