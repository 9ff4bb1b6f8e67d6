//! Prefetch URLs through the control channel.

use anyhow::{bail, Context as _, Result};
use offline_core::PartitionKind;
use offline_proxy::{ControlChannel, PrefetchReport};
use serde_json::json;

use super::PrefetchArgs;
use crate::context::Context;

/// Run the prefetch command.
pub async fn run(args: PrefetchArgs, ctx: &Context) -> Result<()> {
    let proxy = ctx.start_proxy().await?;
    let (control, _task) = ControlChannel::new(proxy.clone()).spawn(16);

    let spinner = ctx.output.spinner(&format!("Prefetching {} URL(s)", args.urls.len()));
    let reply = control
        .request(json!({
            "type": "PREFETCH_RESOURCES",
            "payload": { "urls": args.urls },
        }))
        .await;
    spinner.finish_and_clear();

    let Some(reply) = reply? else {
        bail!("Prefetch produced no reply");
    };
    let report: PrefetchReport =
        serde_json::from_value(reply).context("Unexpected prefetch reply")?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    for url in &report.fetched {
        ctx.output.success(url);
    }
    for url in &report.failed {
        ctx.output.warn(&format!("Failed: {}", url));
    }

    let partition = proxy.config().partition_name(PartitionKind::Runtime);
    let stored = proxy.store().entry_count(&partition).await?;
    ctx.output.info(&format!(
        "{} fetched, {} failed, {} entries in {}",
        report.fetched.len(),
        report.failed.len(),
        stored,
        partition
    ));

    Ok(())
}
