//! Stored responses and their policy metadata.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use offline_core::{ProxyResponse, ResponseSource};
use serde::{Deserialize, Serialize};

/// Policy metadata attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// When a TTL-governed strategy tagged the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    /// Informational lifetime in seconds. Not enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    /// Strategy that wrote the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl EntryMeta {
    /// Metadata tagged with the current time.
    pub fn cached_now() -> Self {
        Self {
            cached_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Set the cached-at tag.
    pub fn with_cached_at(mut self, at: DateTime<Utc>) -> Self {
        self.cached_at = Some(at);
        self
    }

    /// Set the informational TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Record the writing strategy.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }
}

/// A response held in a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in wire order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
    /// When the entry was written.
    pub inserted_at: DateTime<Utc>,
    /// Policy metadata.
    #[serde(default)]
    pub meta: EntryMeta,
}

impl CachedEntry {
    /// Capture a response for storage.
    pub fn from_response(response: &ProxyResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            status: response.status.as_u16(),
            headers,
            body: response.body.clone(),
            inserted_at: Utc::now(),
            meta: EntryMeta::default(),
        }
    }

    /// Attach policy metadata.
    pub fn with_meta(mut self, meta: EntryMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Rebuild a response marked as served from cache.
    pub fn to_response(&self) -> ProxyResponse {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }

        ProxyResponse {
            status: StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK),
            headers,
            body: self.body.clone(),
            source: ResponseSource::Cache,
        }
    }

    /// Age since the cached-at tag, if tagged.
    pub fn cached_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.meta
            .cached_at
            .map(|at| (now - at).to_std().unwrap_or(Duration::ZERO))
    }

    /// Check if the entry was tagged less than `ttl` ago.
    ///
    /// Untagged entries are never fresh.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.cached_age(now).map(|age| age < ttl).unwrap_or(false)
    }

    /// Body size in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }
}
