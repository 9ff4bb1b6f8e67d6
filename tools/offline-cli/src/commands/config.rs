//! Configuration management commands.

use std::fs;

use anyhow::{bail, Context as _, Result};
use url::Url;

use super::{describe_matcher, ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::{Context, CONFIG_NAMES};
use crate::output::format_secs;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init {
            version,
            scope,
            force,
        } => init_config(&version, &scope, force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");

    let proxy = ctx.proxy_config()?;

    ctx.output.info("[proxy]");
    ctx.output.kv("version", &proxy.version);
    ctx.output.kv("cache_prefix", &proxy.cache_prefix);
    ctx.output.kv("scope", proxy.scope.as_str());
    ctx.output.kv(
        "offline_page_url",
        proxy.offline_page_url.as_deref().unwrap_or("(built-in)"),
    );
    ctx.output
        .kv("network_first timeout", &format_secs(proxy.timeouts.network_first.as_secs()));
    ctx.output.kv("api timeout", &format_secs(proxy.timeouts.api.as_secs()));
    ctx.output.kv("image cap", &proxy.image.max_entries.to_string());

    ctx.output.info("");
    ctx.output.info("Partitions:");
    for name in proxy.whitelist() {
        ctx.output.list_item(&name);
    }

    if !proxy.precache_urls.is_empty() {
        ctx.output.info("");
        ctx.output.info("Precache:");
        for url in &proxy.precache_urls {
            ctx.output.list_item(url);
        }
    }

    ctx.output.info("");
    ctx.output.info("Routes:");
    for (i, route) in proxy.routes.iter().enumerate() {
        ctx.output.list_item(&format!(
            "[{}] {} -> {} ({})",
            i,
            describe_matcher(&route.matcher),
            route.strategy,
            route.partition
        ));
    }

    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("format", &ctx.config.logging.format.to_string());
    ctx.output.kv("level", &ctx.config.logging.level);

    Ok(())
}

async fn init_config(version: &str, scope: &str, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let scope = Url::parse(scope).with_context(|| format!("Invalid scope URL: {}", scope))?;
    let content = generate_default_config(version, scope)?;
    fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let proxy = ctx.proxy_config()?;
    let mut warnings: Vec<String> = Vec::new();

    proxy.validate().context("Invalid proxy configuration")?;

    if proxy.precache_urls.is_empty() {
        warnings.push("proxy.precache_urls is empty; nothing is available offline until visited".to_string());
    }

    if let Some(ref page) = proxy.offline_page_url {
        if !proxy.precache_urls.contains(page) {
            warnings.push(format!(
                "proxy.offline_page_url '{}' is not precached; the built-in page will be used",
                page
            ));
        }
    }

    if proxy.routes.is_empty() {
        warnings.push("proxy.routes is empty; every request uses the fallback strategy".to_string());
    }

    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}
