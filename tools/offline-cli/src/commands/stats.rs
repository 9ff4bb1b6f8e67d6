//! Partition statistics.

use anyhow::{bail, Result};
use offline_core::ProxyRequest;
use offline_proxy::{ControlChannel, ControlCommand, ControlReply};

use super::StatsArgs;
use crate::context::Context;

/// Run the stats command.
pub async fn run(args: StatsArgs, ctx: &Context) -> Result<()> {
    let proxy = ctx.start_proxy().await?;

    for raw in &args.warm {
        let url = proxy.config().resolve(raw)?;
        if let Err(e) = proxy.handle(&ProxyRequest::get(url)).await {
            ctx.output.warn(&format!("Warm-up request failed: {}", e));
        }
    }

    let reply = ControlChannel::new(proxy.clone())
        .execute(ControlCommand::CacheStats)
        .await?;
    let Some(ControlReply::Stats(stats)) = reply else {
        bail!("Unexpected stats reply");
    };

    if ctx.output.is_json() {
        ctx.output.json(&stats);
        return Ok(());
    }

    ctx.output.header("Partitions");
    let widths = [28, 8, 8, 30];
    ctx.output
        .table_row(&["NAME", "EXISTS", "ENTRIES", "ERROR"], &widths);
    for (name, entry) in &stats {
        ctx.output.table_row(
            &[
                name.as_str(),
                if entry.exists { "yes" } else { "no" },
                &entry.entry_count.to_string(),
                entry.error.as_deref().unwrap_or(""),
            ],
            &widths,
        );
    }

    ctx.output.info(&proxy.metrics().to_summary());

    Ok(())
}
