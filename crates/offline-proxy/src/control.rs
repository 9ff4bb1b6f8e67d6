//! Out-of-band control messages.

use std::collections::BTreeMap;

use futures::future::join_all;
use offline_core::{CacheKey, PartitionKind, ProxyError, ProxyResult};
use offline_fetch::FetchRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::{Persist, ProxyContext};
use crate::proxy::OfflineProxy;

const KNOWN_COMMANDS: &[&str] = &[
    "SKIP_WAITING",
    "CLEAR_CACHE",
    "CACHE_STATS",
    "PREFETCH_RESOURCES",
];

/// A control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    /// Activate immediately.
    SkipWaiting,
    /// Delete every whitelisted partition.
    ClearCache,
    /// Report entry counts per partition.
    CacheStats,
    /// Fetch and store URLs in the runtime partition.
    PrefetchResources { urls: Vec<String> },
}

impl ControlCommand {
    /// Parse a `{type, payload}` message.
    pub fn from_message(message: &Value) -> ProxyResult<Self> {
        match serde_json::from_value(message.clone()) {
            Ok(command) => Ok(command),
            Err(e) => {
                let kind = message
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("<missing>");
                if KNOWN_COMMANDS.contains(&kind) {
                    Err(ProxyError::Config(format!("malformed {} payload: {}", kind, e)))
                } else {
                    Err(ProxyError::UnknownCommand(kind.to_string()))
                }
            }
        }
    }
}

/// Stats for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionStats {
    pub entry_count: usize,
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a prefetch. `success` is always true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchReport {
    pub success: bool,
    pub fetched: Vec<String>,
    pub failed: Vec<String>,
}

/// Reply to a command that has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
    Cleared { success: bool },
    Stats(BTreeMap<String, PartitionStats>),
    Prefetched(PrefetchReport),
}

/// Executes control commands against a proxy.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    proxy: OfflineProxy,
}

/// A message with an optional reply port.
#[derive(Debug)]
pub struct ControlEnvelope {
    pub message: Value,
    pub reply: Option<oneshot::Sender<Value>>,
}

/// Sending side of a spawned control loop.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlEnvelope>,
}

impl ControlChannel {
    pub fn new(proxy: OfflineProxy) -> Self {
        Self { proxy }
    }

    /// Run a command. `SKIP_WAITING` has no reply.
    pub async fn execute(&self, command: ControlCommand) -> ProxyResult<Option<ControlReply>> {
        debug!(?command, "Control command");
        match command {
            ControlCommand::SkipWaiting => {
                self.proxy.skip_waiting().await?;
                Ok(None)
            }
            ControlCommand::ClearCache => Ok(Some(self.clear_cache().await)),
            ControlCommand::CacheStats => Ok(Some(ControlReply::Stats(self.cache_stats().await))),
            ControlCommand::PrefetchResources { urls } => {
                Ok(Some(ControlReply::Prefetched(self.prefetch(&urls).await)))
            }
        }
    }

    /// Parse and run a raw message.
    ///
    /// Unknown or malformed messages are logged and ignored.
    pub async fn handle_message(&self, message: &Value) -> Option<Value> {
        let command = match ControlCommand::from_message(message) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Ignoring control message");
                return None;
            }
        };

        match self.execute(command).await {
            Ok(reply) => reply.and_then(|r| serde_json::to_value(r).ok()),
            Err(e) => {
                warn!(error = %e, "Control command failed");
                None
            }
        }
    }

    /// Spawn a loop that handles envelopes concurrently until every handle is dropped.
    pub fn spawn(self, buffer: usize) -> (ControlHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ControlEnvelope>(buffer);
        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let channel = self.clone();
                tokio::spawn(async move {
                    let reply = channel.handle_message(&envelope.message).await;
                    if let (Some(port), Some(reply)) = (envelope.reply, reply) {
                        let _ = port.send(reply);
                    }
                });
            }
            debug!("Control loop stopped");
        });
        (ControlHandle { tx }, task)
    }

    fn ctx(&self) -> &ProxyContext {
        self.proxy.context()
    }

    async fn clear_cache(&self) -> ControlReply {
        let mut success = true;
        for name in self.ctx().config.whitelist() {
            if let Err(e) = self.ctx().store.delete_store(&name).await {
                warn!(partition = %name, error = %e, "Failed to clear partition");
                success = false;
            }
        }
        info!(success, "Cleared partitions");
        ControlReply::Cleared { success }
    }

    async fn cache_stats(&self) -> BTreeMap<String, PartitionStats> {
        let mut stats = BTreeMap::new();
        for name in self.ctx().config.whitelist() {
            let entry = match self.partition_stats(&name).await {
                Ok(entry) => entry,
                Err(e) => PartitionStats {
                    entry_count: 0,
                    exists: false,
                    error: Some(e.to_string()),
                },
            };
            stats.insert(name, entry);
        }
        stats
    }

    async fn partition_stats(&self, name: &str) -> ProxyResult<PartitionStats> {
        let store = &self.ctx().store;
        if !store.has(name).await? {
            return Ok(PartitionStats {
                entry_count: 0,
                exists: false,
                error: None,
            });
        }
        Ok(PartitionStats {
            entry_count: store.entry_count(name).await?,
            exists: true,
            error: None,
        })
    }

    async fn prefetch(&self, urls: &[String]) -> PrefetchReport {
        let ctx = self.ctx();
        let persist = Persist::new(ctx.partition(PartitionKind::Runtime), "prefetch");

        let results = join_all(urls.iter().map(|raw| {
            let persist = &persist;
            async move {
                let url = match ctx.config.resolve(raw) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(url = %raw, error = %e, "Skipping unresolvable prefetch URL");
                        return (raw.clone(), false);
                    }
                };
                let stored = match ctx.fetch(&FetchRequest::get(url.clone())).await {
                    Ok(response) => ctx.persist(persist, &CacheKey::get(&url), &response).await,
                    Err(e) => {
                        warn!(url = %url, error = %e, "Prefetch failed");
                        false
                    }
                };
                (raw.clone(), stored)
            }
        }))
        .await;

        let (fetched, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(|(_, ok)| *ok);
        PrefetchReport {
            success: true,
            fetched: fetched.into_iter().map(|(url, _)| url).collect(),
            failed: failed.into_iter().map(|(url, _)| url).collect(),
        }
    }
}

impl ControlHandle {
    /// Send without waiting for a reply.
    pub async fn post(&self, message: Value) -> ProxyResult<()> {
        self.send(ControlEnvelope {
            message,
            reply: None,
        })
        .await
    }

    /// Send and wait for the reply, if the command has one.
    pub async fn request(&self, message: Value) -> ProxyResult<Option<Value>> {
        let (tx, rx) = oneshot::channel();
        self.send(ControlEnvelope {
            message,
            reply: Some(tx),
        })
        .await?;
        Ok(rx.await.ok())
    }

    async fn send(&self, envelope: ControlEnvelope) -> ProxyResult<()> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| ProxyError::Config("control loop has stopped".to_string()))
    }
}
