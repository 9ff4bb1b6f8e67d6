//! Request and response descriptors for the interception boundary.

use std::fmt;
use std::str::FromStr;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProxyError;

/// What the requester intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Image,
    Font,
    Style,
    Script,
    Audio,
    Video,
    Manifest,
    /// `fetch()`/XHR style requests with no declared destination.
    #[default]
    Empty,
}

impl Destination {
    /// Get the wire name of this destination.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Font => "font",
            Self::Style => "style",
            Self::Script => "script",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Manifest => "manifest",
            Self::Empty => "",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            "font" => Ok(Self::Font),
            "style" => Ok(Self::Style),
            "script" => Ok(Self::Script),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "manifest" => Ok(Self::Manifest),
            "" | "empty" => Ok(Self::Empty),
            other => Err(ProxyError::Config(format!("unknown destination '{}'", other))),
        }
    }
}

/// An outbound request as seen by the proxy.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Declared destination.
    pub destination: Destination,
    /// Request headers.
    pub headers: HeaderMap,
}

impl ProxyRequest {
    /// Create a new request with no headers and an empty destination.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            destination: Destination::Empty,
            headers: HeaderMap::new(),
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse a URL string and create a request for it.
    pub fn parse(method: Method, url: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(url)
            .map_err(|e| ProxyError::Config(format!("invalid URL '{}': {}", url, e)))?;
        Ok(Self::new(method, url))
    }

    /// Set the destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Request path (always starts with `/` for http(s) URLs).
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Check if this is a top-level document navigation.
    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    /// Check if the scheme is one the proxy may cache.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Check for a WebSocket upgrade handshake.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
    }

    /// Key under which a response to this request is stored.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url)
    }
}

/// Identity of a stored entry: (method, URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    method: String,
    url: String,
}

impl CacheKey {
    /// Create a key from a method and URL.
    pub fn new(method: &Method, url: &Url) -> Self {
        Self {
            method: method.as_str().to_string(),
            url: url.as_str().to_string(),
        }
    }

    /// Create a GET key.
    pub fn get(url: &Url) -> Self {
        Self::new(&Method::GET, url)
    }

    /// The method component.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The URL component.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Where a response handed back to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Fresh from the network.
    Network,
    /// Served from a partition.
    Cache,
    /// Synthesized by the proxy (offline page, placeholder, 503).
    Fallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "NETWORK"),
            Self::Cache => write!(f, "CACHE"),
            Self::Fallback => write!(f, "FALLBACK"),
        }
    }
}

/// A full response returned across the interception boundary.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
    /// Provenance of this response.
    pub source: ResponseSource,
}

impl ProxyResponse {
    /// Create a network response.
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            source: ResponseSource::Network,
        }
    }

    /// Create a 200 OK network response.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the provenance.
    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Size declared by `Content-Length`, if any.
    pub fn declared_size(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// Get the `Content-Type` header value.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
