//! Output formatting for the CLI.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use offline_core::ResponseSource;

/// Output handler for CLI messages.
///
/// In JSON mode only [`Output::json`] and errors print.
#[derive(Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    fn human(&self) -> bool {
        !self.json
    }

    pub fn info(&self, msg: &str) {
        if self.human() {
            println!("{} {}", style("ℹ").blue(), msg);
        }
    }

    pub fn success(&self, msg: &str) {
        if self.human() {
            println!("{} {}", style("✓").green(), msg);
        }
    }

    pub fn warn(&self, msg: &str) {
        if self.human() {
            eprintln!("{} {}", style("⚠").yellow(), msg);
        }
    }

    pub fn error(&self, msg: &str) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        } else {
            eprintln!("{} {}", style("✗").red(), style(msg).red());
        }
    }

    /// Only printed with `--verbose`.
    pub fn debug(&self, msg: &str) {
        if self.verbose && self.human() {
            eprintln!("{} {}", style("→").dim(), style(msg).dim());
        }
    }

    pub fn header(&self, msg: &str) {
        if self.human() {
            println!("\n{}", style(msg).bold().underlined());
        }
    }

    /// Pretty-print a value as JSON.
    pub fn json<T: serde::Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.human() {
            println!("  {}: {}", style(key).dim(), value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.human() {
            println!("  {} {}", style("•").dim(), item);
        }
    }

    /// Print columns padded to `widths`.
    pub fn table_row(&self, cols: &[&str], widths: &[usize]) {
        if !self.human() {
            return;
        }
        let row: Vec<String> = cols
            .iter()
            .zip(widths)
            .map(|(col, width)| format!("{:width$}", col, width = *width))
            .collect();
        println!("  {}", row.join("  "));
    }

    /// Spinner on stderr; hidden in JSON mode.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if !self.human() {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Colored label for where a response came from.
pub fn source_badge(source: ResponseSource) -> String {
    let label = source.to_string();
    match source {
        ResponseSource::Network => style(label).cyan().to_string(),
        ResponseSource::Cache => style(label).green().to_string(),
        ResponseSource::Fallback => style(label).yellow().to_string(),
    }
}

/// Format bytes as human-readable size.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a duration in seconds as a short string.
pub fn format_secs(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}
