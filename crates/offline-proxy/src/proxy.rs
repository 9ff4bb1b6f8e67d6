//! Interception boundary.

use std::sync::Arc;

use offline_core::{ProxyConfig, ProxyRequest, ProxyResponse, ProxyResult};
use offline_fetch::{network_error, FetchRequest, Fetcher};
use offline_observability::MetricsSnapshot;
use offline_store::StoreManager;
use tracing::{debug, info, instrument};

use crate::classify::{Classification, PassThroughReason};
use crate::context::ProxyContext;
use crate::fallback;
use crate::lifecycle::{self, InstallReport, Lifecycle, LifecycleState};
use crate::strategy;

/// A proxy version: its configuration, partitions and lifecycle.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct OfflineProxy {
    ctx: Arc<ProxyContext>,
    lifecycle: Arc<Lifecycle>,
}

impl OfflineProxy {
    /// Create a proxy in the installing state.
    pub fn new(
        config: ProxyConfig,
        store: StoreManager,
        fetcher: Arc<dyn Fetcher>,
    ) -> ProxyResult<Self> {
        config.validate()?;
        Ok(Self {
            ctx: Arc::new(ProxyContext::new(config, store, fetcher)),
            lifecycle: Arc::new(Lifecycle::new()),
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.ctx.config
    }

    pub fn store(&self) -> &StoreManager {
        &self.ctx.store
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Snapshot of the request counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub(crate) fn context(&self) -> &ProxyContext {
        &self.ctx
    }

    /// Classify a request as this proxy would right now.
    pub fn classify(&self, request: &ProxyRequest) -> Classification {
        if !self.lifecycle.is_active() {
            return Classification::PassThrough(PassThroughReason::NotControlling);
        }
        self.ctx.routes.classify(request)
    }

    /// Pre-populate the static partition, then wait (or activate if skip-waiting
    /// was requested during install).
    ///
    /// Individual precache failures don't fail the install.
    pub async fn install(&self) -> ProxyResult<InstallReport> {
        self.lifecycle
            .ensure(&[LifecycleState::Installing], LifecycleState::Waiting)?;

        let report = lifecycle::precache(&self.ctx).await;
        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Install finished"
        );

        let _guard = self.lifecycle.lock_activation().await;
        self.lifecycle
            .transition(&[LifecycleState::Installing], LifecycleState::Waiting)?;
        if self.lifecycle.skip_waiting_requested() {
            self.activate_locked().await?;
        }
        Ok(report)
    }

    /// Delete partitions from other versions, then start intercepting.
    ///
    /// Returns the deleted partition names.
    pub async fn activate(&self) -> ProxyResult<Vec<String>> {
        let _guard = self.lifecycle.lock_activation().await;
        self.activate_locked().await
    }

    async fn activate_locked(&self) -> ProxyResult<Vec<String>> {
        self.lifecycle
            .ensure(&[LifecycleState::Waiting], LifecycleState::Active)?;

        let deleted = lifecycle::collect_garbage(&self.ctx).await;
        self.lifecycle
            .transition(&[LifecycleState::Waiting], LifecycleState::Active)?;
        Ok(deleted)
    }

    /// Activate without waiting for the previous version to be released.
    ///
    /// During install the request is remembered; once active it's a no-op.
    pub async fn skip_waiting(&self) -> ProxyResult<()> {
        let _guard = self.lifecycle.lock_activation().await;
        match self.lifecycle.state() {
            LifecycleState::Installing => {
                self.lifecycle.request_skip_waiting();
                Ok(())
            }
            LifecycleState::Waiting => self.activate_locked().await.map(|_| ()),
            LifecycleState::Active | LifecycleState::Redundant => Ok(()),
        }
    }

    /// Mark this version as superseded.
    pub fn retire(&self) -> ProxyResult<()> {
        self.lifecycle.transition(
            &[
                LifecycleState::Installing,
                LifecycleState::Waiting,
                LifecycleState::Active,
            ],
            LifecycleState::Redundant,
        )
    }

    /// Install and activate immediately.
    pub async fn start(&self) -> ProxyResult<InstallReport> {
        self.lifecycle.request_skip_waiting();
        self.install().await
    }

    /// Answer an intercepted request.
    ///
    /// Pass-through requests go straight to the network without touching any
    /// partition. A navigation that fails outright gets the offline page.
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn handle(&self, request: &ProxyRequest) -> ProxyResult<ProxyResponse> {
        let route = match self.classify(request) {
            Classification::PassThrough(reason) => {
                debug!(%reason, "Passing through");
                return self.pass_through(request).await;
            }
            Classification::Route(route) => route,
        };

        match strategy::execute(&self.ctx, &route, request).await {
            Err(e) if e.is_network() && request.is_navigation() => {
                debug!(error = %e, "Navigation failed, serving offline page");
                self.ctx.metrics.record_fallback();
                Ok(fallback::offline_page(&self.ctx).await)
            }
            other => other,
        }
    }

    async fn pass_through(&self, request: &ProxyRequest) -> ProxyResult<ProxyResponse> {
        self.ctx.metrics.record_pass_through();
        self.ctx
            .fetch(&FetchRequest::from_proxy(request))
            .await
            .map_err(|e| network_error(&request.url, &e))
    }
}

impl std::fmt::Debug for OfflineProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineProxy")
            .field("version", &self.ctx.config.version)
            .field("state", &self.lifecycle.state())
            .finish_non_exhaustive()
    }
}
