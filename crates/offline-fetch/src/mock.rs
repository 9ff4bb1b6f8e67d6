//! Scripted fetcher for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use offline_core::{ProxyResponse, ResponseSource};
use url::Url;

use crate::client::{FetchError, FetchRequest, Fetcher};

/// What a scripted URL answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(ProxyResponse),
    Fail(String),
}

#[derive(Debug, Clone)]
struct MockRoute {
    reply: MockReply,
    delay: Option<Duration>,
}

/// Fetcher answering from a table of scripted replies.
///
/// Unscripted URLs fail with a connection error. Every call is counted,
/// including calls that fail.
#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, MockRoute>>,
    calls: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<FetchRequest>>,
    offline: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl MockFetcher {
    /// Create a fetcher with no scripted URLs.
    pub fn new() -> Self {
        Self::default()
    }

    fn set_reply(&self, url: &str, reply: MockReply) {
        let mut routes = lock(&self.routes);
        let route = routes.entry(normalize(url)).or_insert(MockRoute {
            reply: reply.clone(),
            delay: None,
        });
        route.reply = reply;
    }

    /// Answer `url` with a response.
    pub fn respond(&self, url: &str, response: ProxyResponse) -> &Self {
        self.set_reply(url, MockReply::Respond(response));
        self
    }

    /// Answer `url` with a 200 text body.
    pub fn respond_text(&self, url: &str, body: &str) -> &Self {
        self.respond(url, ProxyResponse::ok(body))
    }

    /// Fail `url` with a connection error.
    pub fn fail(&self, url: &str, reason: &str) -> &Self {
        self.set_reply(url, MockReply::Fail(reason.to_string()));
        self
    }

    /// Delay every answer for `url`.
    pub fn delay(&self, url: &str, delay: Duration) -> &Self {
        if let Some(route) = lock(&self.routes).get_mut(&normalize(url)) {
            route.delay = Some(delay);
        }
        self
    }

    /// Make every request fail regardless of script.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches issued for `url`.
    pub fn calls(&self, url: &str) -> usize {
        lock(&self.calls).get(&normalize(url)).copied().unwrap_or(0)
    }

    /// Number of fetches issued for any URL.
    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    /// Most recent request issued for `url`.
    pub fn last_request(&self, url: &str) -> Option<FetchRequest> {
        let url = normalize(url);
        lock(&self.requests)
            .iter()
            .rev()
            .find(|r| r.url.as_str() == url)
            .cloned()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<ProxyResponse, FetchError> {
        let url = request.url.to_string();
        *lock(&self.calls).entry(url.clone()).or_insert(0) += 1;
        lock(&self.requests).push(request.clone());

        let route = lock(&self.routes).get(&url).cloned();

        if let Some(delay) = route.as_ref().and_then(|r| r.delay) {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Connection("network unavailable".to_string()));
        }

        match route.map(|r| r.reply) {
            Some(MockReply::Respond(response)) => Ok(response.with_source(ResponseSource::Network)),
            Some(MockReply::Fail(reason)) => Err(FetchError::Connection(reason)),
            None => Err(FetchError::Connection(format!("no route to {}", url))),
        }
    }
}
