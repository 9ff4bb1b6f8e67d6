//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use offline_core::ProxyConfig;
use offline_fetch::HttpFetcher;
use offline_proxy::OfflineProxy;
use offline_store::StoreManager;

use crate::config::CliConfig;
use crate::output::Output;

pub const CONFIG_NAMES: [&str; 3] = ["offline.toml", ".offline.toml", "offline.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config = if let Some(path) = config_path {
            CliConfig::load(path)?
        } else {
            Self::find_config(&cwd).unwrap_or_default()
        };

        Ok(Self { config, output, cwd })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<CliConfig> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = CliConfig::load(config_path.to_str()?) {
                        return Some(config);
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// The `[proxy]` section.
    pub fn proxy_config(&self) -> Result<&ProxyConfig> {
        self.config
            .proxy
            .as_ref()
            .ok_or_else(|| anyhow!("No [proxy] section found. Run `offline config init` to create one."))
    }

    /// Build a proxy over an in-memory store and the real network.
    pub fn build_proxy(&self) -> Result<OfflineProxy> {
        let config = self.proxy_config()?.clone();
        OfflineProxy::new(config, StoreManager::in_memory(), Arc::new(HttpFetcher::new()))
            .context("Invalid proxy configuration")
    }

    /// Build a proxy, install and activate it.
    pub async fn start_proxy(&self) -> Result<OfflineProxy> {
        let proxy = self.build_proxy()?;

        let spinner = self.output.spinner("Installing");
        let report = proxy.start().await;
        spinner.finish_and_clear();

        let report = report.context("Failed to start proxy")?;
        self.output.debug(&format!(
            "Precached {} URL(s), {} failed",
            report.cached.len(),
            report.failed.len()
        ));
        for url in &report.failed {
            self.output.warn(&format!("Precache failed: {}", url));
        }
        Ok(proxy)
    }
}
