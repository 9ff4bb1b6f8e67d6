//! Offline CLI - Command line tool for the adaptive caching proxy.
//!
//! Commands:
//! - `offline config` - Show, create or validate configuration
//! - `offline classify` - Show which strategy a request would get
//! - `offline fetch` - Send requests through a live proxy
//! - `offline prefetch` - Warm the runtime partition via the control channel
//! - `offline stats` - Report per-partition entry counts

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use offline_observability::{init_logging, LogFormat};

use commands::{ClassifyArgs, ConfigArgs, FetchArgs, PrefetchArgs, StatsArgs};

/// Offline CLI - Inspect and exercise the adaptive caching proxy
#[derive(Parser)]
#[command(name = "offline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),

    /// Classify a request against the route table
    Classify(ClassifyArgs),

    /// Send requests through a live proxy
    Fetch(FetchArgs),

    /// Prefetch URLs into the runtime partition
    Prefetch(PrefetchArgs),

    /// Show partition statistics
    Stats(StatsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);
    let ctx = context::Context::load(cli.config.as_deref(), output)?;

    let format = if cli.json {
        LogFormat::Json
    } else {
        ctx.config.logging.format
    };
    let level = if cli.verbose {
        "debug"
    } else {
        ctx.config.logging.level.as_str()
    };
    if let Err(e) = init_logging(format, level) {
        ctx.output.warn(&format!("Logging disabled: {}", e));
    }

    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Classify(args) => commands::classify::run(args, &ctx).await,
        Commands::Fetch(args) => commands::fetch::run(args, &ctx).await,
        Commands::Prefetch(args) => commands::prefetch::run(args, &ctx).await,
        Commands::Stats(args) => commands::stats::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
