//! CLI configuration.

use anyhow::{Context, Result};
use offline_core::ProxyConfig;
use offline_observability::LogFormat;
use serde::{Deserialize, Serialize};
use url::Url;

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Proxy configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Create a config for a site.
    pub fn for_site(version: &str, scope: Url) -> Self {
        Self {
            proxy: Some(ProxyConfig::new(version, scope)),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Level for the proxy crates when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_level(),
        }
    }
}

/// Generate a default offline.toml config file.
pub fn generate_default_config(version: &str, scope: Url) -> Result<String> {
    let body = toml::to_string_pretty(&CliConfig::for_site(version, scope))
        .context("Failed to render default config")?;
    Ok(format!(
        "# Adaptive caching proxy configuration\n#\n# Partition names are <cache_prefix>-<kind>-<version>. Bump `version` to\n# drop every partition of the previous release on activation.\n\n{}",
        body
    ))
}
