//! CLI command implementations.

pub mod classify;
pub mod config;
pub mod fetch;
pub mod prefetch;
pub mod stats;

use clap::{Args, Subcommand};
use offline_core::{Destination, RouteMatcher};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Cache version.
        #[arg(long, default_value = "v1")]
        version: String,

        /// Site scope URL.
        #[arg(long, default_value = "http://localhost:8080/")]
        scope: String,

        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// Request URL, absolute or relative to the scope.
    pub url: String,

    /// HTTP method.
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Request destination (document, image, font, ...).
    #[arg(short, long)]
    pub destination: Option<Destination>,

    /// Print the whole route table in evaluation order.
    #[arg(long)]
    pub table: bool,
}

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// Request URL, absolute or relative to the scope.
    pub url: String,

    /// Request destination (document, image, font, ...).
    #[arg(short, long)]
    pub destination: Option<Destination>,

    /// Number of times to send the request.
    #[arg(short = 'n', long, default_value = "1")]
    pub repeat: usize,

    /// Pause between requests, in milliseconds.
    #[arg(long, default_value = "0")]
    pub interval_ms: u64,
}

/// Arguments for the prefetch command.
#[derive(Args)]
pub struct PrefetchArgs {
    /// URLs to prefetch, absolute or relative to the scope.
    #[arg(required = true)]
    pub urls: Vec<String>,
}

/// Arguments for the stats command.
#[derive(Args)]
pub struct StatsArgs {
    /// URLs to request before collecting stats.
    #[arg(short, long)]
    pub warm: Vec<String>,
}

/// Short description of a matcher.
pub fn describe_matcher(matcher: &RouteMatcher) -> String {
    match matcher {
        RouteMatcher::Extension(exts) => format!("ext {}", exts.join(",")),
        RouteMatcher::Destination(dest) => format!("destination {}", dest),
        RouteMatcher::PathPrefix(prefix) => format!("prefix {}", prefix),
    }
}
