//! Send requests through a live proxy.

use std::time::{Duration, Instant};

use anyhow::Result;
use offline_core::ProxyRequest;
use serde::Serialize;

use super::FetchArgs;
use crate::context::Context;
use crate::output::{format_bytes, source_badge};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Attempt {
    attempt: usize,
    status: Option<u16>,
    source: Option<String>,
    bytes: usize,
    elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the fetch command.
pub async fn run(args: FetchArgs, ctx: &Context) -> Result<()> {
    let proxy = ctx.start_proxy().await?;
    let url = proxy.config().resolve(&args.url)?;
    let mut request = ProxyRequest::get(url);
    if let Some(destination) = args.destination {
        request = request.with_destination(destination);
    }

    if let Some(strategy) = proxy.classify(&request).strategy() {
        ctx.output.debug(&format!("Strategy: {}", strategy));
    }

    let mut attempts = Vec::with_capacity(args.repeat);
    for attempt in 1..=args.repeat.max(1) {
        if attempt > 1 && args.interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }

        let started = Instant::now();
        let result = proxy.handle(&request).await;
        let elapsed_ms = started.elapsed().as_millis();

        let row = match result {
            Ok(response) => {
                if !ctx.output.is_json() {
                    println!(
                        "  #{:<3} {} {:>9} {} {}ms",
                        attempt,
                        response.status.as_u16(),
                        format_bytes(response.body.len() as u64),
                        source_badge(response.source),
                        elapsed_ms
                    );
                }
                Attempt {
                    attempt,
                    status: Some(response.status.as_u16()),
                    source: Some(response.source.to_string()),
                    bytes: response.body.len(),
                    elapsed_ms,
                    error: None,
                }
            }
            Err(e) => {
                ctx.output.warn(&format!("#{} failed: {}", attempt, e));
                Attempt {
                    attempt,
                    status: None,
                    source: None,
                    bytes: 0,
                    elapsed_ms,
                    error: Some(e.to_string()),
                }
            }
        };
        attempts.push(row);
    }

    let metrics = proxy.metrics();
    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "url": request.url.as_str(),
            "attempts": attempts,
            "metrics": metrics,
        }));
    } else {
        ctx.output.info(&metrics.to_summary());
    }

    Ok(())
}
