//! Proxy lifecycle: install, activation and retirement.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use offline_core::{CacheKey, PartitionKind, ProxyError, ProxyResult};
use offline_fetch::FetchRequest;
use serde::Serialize;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::context::{Persist, ProxyContext};

/// Lifecycle states of a proxy version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Pre-populating the static partition.
    Installing,
    /// Installed, another version still controls.
    Waiting,
    /// Intercepting requests.
    Active,
    /// Superseded or failed. Terminal.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Observable lifecycle state with a pending skip-waiting request.
///
/// Leaving `Waiting` happens under `activation`.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
    skip_waiting: AtomicBool,
    activation: Mutex<()>,
}

impl Lifecycle {
    /// Start in [`LifecycleState::Installing`].
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Installing);
        Self {
            state,
            skip_waiting: AtomicBool::new(false),
            activation: Mutex::new(()),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Check if the proxy is intercepting requests.
    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Fail unless the current state is one of `allowed`.
    pub(crate) fn ensure(&self, allowed: &[LifecycleState], to: LifecycleState) -> ProxyResult<()> {
        let current = self.state();
        if allowed.contains(&current) {
            Ok(())
        } else {
            Err(invalid(current, to))
        }
    }

    /// Move to `to` if the current state is one of `from`.
    pub(crate) fn transition(&self, from: &[LifecycleState], to: LifecycleState) -> ProxyResult<()> {
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                *state = to;
                true
            } else {
                rejected = Some(*state);
                false
            }
        });

        match rejected {
            Some(current) => Err(invalid(current, to)),
            None => {
                info!(state = %to, "Lifecycle transition");
                Ok(())
            }
        }
    }

    /// Hold while leaving `Waiting`.
    pub(crate) async fn lock_activation(&self) -> MutexGuard<'_, ()> {
        self.activation.lock().await
    }

    pub(crate) fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub(crate) fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(from: LifecycleState, to: LifecycleState) -> ProxyError {
    ProxyError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Outcome of pre-populating the static partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// URLs stored.
    pub cached: Vec<String>,
    /// URLs that failed to resolve, fetch or store.
    pub failed: Vec<String>,
}

/// Fetch every precache URL in parallel and store successes.
pub(crate) async fn precache(ctx: &ProxyContext) -> InstallReport {
    let persist = Persist::new(ctx.partition(PartitionKind::Static), "precache");

    let results = join_all(ctx.config.precache_urls.iter().map(|raw| {
        let persist = &persist;
        async move {
            let url = match ctx.config.resolve(raw) {
                Ok(url) => url,
                Err(e) => {
                    warn!(url = %raw, error = %e, "Skipping unresolvable precache URL");
                    return (raw.clone(), false);
                }
            };

            let stored = match ctx.fetch(&FetchRequest::get(url.clone())).await {
                Ok(response) => ctx.persist(persist, &CacheKey::get(&url), &response).await,
                Err(e) => {
                    warn!(url = %url, error = %e, "Precache fetch failed");
                    false
                }
            };
            (url.to_string(), stored)
        }
    }))
    .await;

    let mut report = InstallReport::default();
    for (url, stored) in results {
        if stored {
            report.cached.push(url);
        } else {
            report.failed.push(url);
        }
    }
    report
}

/// Delete every partition outside the current version's whitelist.
///
/// Returns the names deleted. Failures are logged and skipped.
pub(crate) async fn collect_garbage(ctx: &ProxyContext) -> Vec<String> {
    let names = match ctx.store.store_names().await {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "Failed to list partitions for cleanup");
            return Vec::new();
        }
    };

    let mut deleted = Vec::new();
    for name in names.into_iter().filter(|n| !ctx.config.is_whitelisted(n)) {
        match ctx.store.delete_store(&name).await {
            Ok(_) => {
                debug!(partition = %name, "Deleted obsolete partition");
                deleted.push(name);
            }
            Err(e) => warn!(partition = %name, error = %e, "Failed to delete obsolete partition"),
        }
    }
    deleted
}
