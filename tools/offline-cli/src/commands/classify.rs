//! Route classification command.

use anyhow::{Context as _, Result};
use http::Method;
use offline_core::ProxyRequest;
use offline_proxy::{Classification, RouteTable};
use serde_json::json;

use super::{describe_matcher, ClassifyArgs};
use crate::context::Context;
use crate::output::format_secs;

/// Run the classify command.
pub async fn run(args: ClassifyArgs, ctx: &Context) -> Result<()> {
    let config = ctx.proxy_config()?;
    let table = RouteTable::new(&config.routes);

    if args.table {
        print_table(&table, ctx);
        return Ok(());
    }

    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method: {}", args.method))?;
    let url = config.resolve(&args.url)?;
    let mut request = ProxyRequest::new(method, url);
    if let Some(destination) = args.destination {
        request = request.with_destination(destination);
    }

    let classification = table.classify(&request);

    match &classification {
        Classification::PassThrough(reason) => {
            if ctx.output.is_json() {
                ctx.output.json(&json!({
                    "url": request.url.as_str(),
                    "passThrough": reason.to_string(),
                }));
            } else {
                ctx.output.info(&format!("{} passes through: {}", request.url, reason));
            }
        }
        Classification::Route(decision) => {
            let partition = config.partition_name(decision.partition);
            if ctx.output.is_json() {
                ctx.output.json(&json!({
                    "url": request.url.as_str(),
                    "strategy": decision.strategy,
                    "partition": partition,
                    "policyIndex": decision.policy_index,
                    "ttlSecs": decision.ttl.map(|t| t.as_secs()),
                    "maxEntries": decision.max_entries,
                }));
                return Ok(());
            }

            ctx.output.header(request.url.as_str());
            ctx.output.kv("strategy", &decision.strategy.to_string());
            ctx.output.kv("partition", &partition);
            match (decision.policy_index, decision.category) {
                (Some(index), Some(category)) => {
                    ctx.output
                        .kv("matched", &format!("route [{}] ({:?})", index, category));
                }
                _ => ctx.output.kv("matched", "no route, fallback by destination"),
            }
            if let Some(ttl) = decision.ttl {
                ctx.output.kv("ttl", &format_secs(ttl.as_secs()));
            }
            if let Some(max) = decision.max_entries {
                ctx.output.kv("max entries", &max.to_string());
            }
        }
    }

    Ok(())
}

fn print_table(table: &RouteTable, ctx: &Context) {
    if ctx.output.is_json() {
        let rows: Vec<_> = table
            .iter()
            .map(|(index, policy)| json!({ "index": index, "policy": policy }))
            .collect();
        ctx.output.json(&rows);
        return;
    }

    ctx.output.header("Route table (evaluation order)");
    let widths = [5, 24, 36, 24];
    ctx.output.table_row(&["#", "CATEGORY", "MATCHER", "STRATEGY"], &widths);
    for (index, policy) in table.iter() {
        ctx.output.table_row(
            &[
                &index.to_string(),
                &format!("{:?}", policy.category),
                &describe_matcher(&policy.matcher),
                policy.strategy.name(),
            ],
            &widths,
        );
    }
}
