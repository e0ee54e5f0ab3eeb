//! Demo attrlink worker: grep-like line filter
//!
//! Declares `file` and `query` inputs and a `rows` output. Each batch
//! filters the lines of `file` that contain `query` and publishes them as
//! a JSON array of `{line, text}` rows. Shows the per-batch policy real
//! workers follow: empty or bad inputs go into that attribute's error
//! field, failures of the work itself become a global error report.

use clap::Parser;

use attrlink_client::Plugin;
use attrlink_client::config;
use attrlink_utils::{init_logging_with_config, LogConfig, LogOutput, Result};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Identity assigned by the host
    uid: String,

    /// Host endpoint: config alias, TCP port, or host:port address
    endpoint: String,
}

#[tokio::main]
async fn main() {
    let log_config = LogConfig {
        output: LogOutput::Stderr,
        filter: std::env::var("ATTRLINK_LOG").unwrap_or_else(|_| config::default_log_filter()),
        file_line: false,
    };
    if let Err(e) = init_logging_with_config(log_config) {
        eprintln!("Failed to init logging: {}", e);
        std::process::exit(1);
    }

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut plugin = Plugin::new();
    let file = plugin.declare_input("file", "")?;
    let query = plugin.declare_input("query", "")?;
    let rows = plugin.declare_output("rows", "[]")?;

    plugin.start(&args.uid, &args.endpoint).await?;

    while plugin.next_batch().await? {
        if file.value().is_empty() {
            file.set_error("empty");
            plugin.finalize().await?;
            continue;
        }
        if query.value().is_empty() {
            query.set_error("empty");
            plugin.finalize().await?;
            continue;
        }

        let content = match std::fs::read_to_string(file.value()) {
            Ok(content) => content,
            Err(e) => {
                file.set_error(format!("open({}) failed: {}", file.value(), e));
                plugin.finalize().await?;
                continue;
            }
        };

        match filter_rows(&content, &query.value()) {
            Ok(json) => {
                rows.set_value(json);
                rows.clear_error();
                plugin.finalize().await?;
            }
            Err(e) => {
                plugin.report_error(&format!("serialize failed: {}", e)).await?;
            }
        }
    }

    plugin.shutdown().await
}

fn filter_rows(content: &str, needle: &str) -> serde_json::Result<String> {
    let rows: Vec<serde_json::Value> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(needle))
        .map(|(n, line)| serde_json::json!({ "line": n + 1, "text": line }))
        .collect();
    serde_json::to_string(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rows_matches() {
        let json = filter_rows("alpha\nbeta\ngamma\nbetamax\n", "beta").unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["line"], 2);
        assert_eq!(rows[0]["text"], "beta");
        assert_eq!(rows[1]["line"], 4);
    }

    #[test]
    fn test_filter_rows_no_match_is_empty_array() {
        assert_eq!(filter_rows("alpha\n", "zzz").unwrap(), "[]");
    }
}
