//! Tail command
//!
//! Poll the active backend and stream entries not seen in the previous
//! cycle. The backend has no change notification, so each cycle hashes
//! every fetched entry and emits only the fresh ones. Cancellation is
//! process termination.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use commonlog::engine::{LogEntry, LogQuery};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Continuously stream new log entries
#[derive(Debug, Clone, Parser)]
pub struct TailArgs {
    /// Polling interval in seconds
    #[arg(short, long, default_value = "5")]
    pub interval: u64,

    /// Number of recent entries to load per cycle
    #[arg(long, default_value = "50")]
    pub limit: usize,
}

/// Execute the tail command
pub async fn execute(config_path: &Path, args: TailArgs) -> Result<()> {
    let engine = super::build_engine(config_path)?;

    let limit = args.limit.max(1);
    let query = LogQuery {
        limit,
        fetch_limit: Some(limit),
        ..Default::default()
    };

    println!("{}", "Tailing log output. Press Ctrl+C to stop.".bold());

    let mut ticker = interval(Duration::from_secs(args.interval.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut seen: HashSet<String> = HashSet::new();

    loop {
        ticker.tick().await;

        let mut logs = engine.get_logs(&query).await?;
        // Chronological order for streaming output.
        logs.reverse();

        let mut current = HashSet::with_capacity(logs.len());
        for entry in &logs {
            let hash = entry_hash(entry);
            if !seen.contains(&hash) {
                print_entry(entry);
            }
            current.insert(hash);
        }

        seen = current;
    }
}

/// Content hash identifying an entry across polling cycles.
fn entry_hash(entry: &LogEntry) -> String {
    let serialized = serde_json::to_string(entry).unwrap_or_default();
    let digest = Sha256::digest(serialized.as_bytes());
    format!("{:x}", digest)
}

fn print_entry(entry: &LogEntry) {
    let timestamp = if entry.logged_at.is_empty() {
        "-"
    } else {
        &entry.logged_at
    };

    println!(
        "[{}] {}: {}",
        timestamp.dimmed(),
        super::logs::colorize_level(&entry.level),
        entry.message
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            id: 0,
            logged_at: "2026-08-06 09:30:00".to_string(),
            level: "INFO".to_string(),
            message: message.to_string(),
            context: String::new(),
            context_array: Map::new(),
            origin_plugin: String::new(),
            origin_file: String::new(),
            issue_summary: String::new(),
            plugin: String::new(),
            theme: String::new(),
            file: String::new(),
            line: 0,
            hook: String::new(),
            function_chain: Vec::new(),
        }
    }

    #[test]
    fn test_entry_hash_is_stable_and_distinct() {
        let a = entry("one");
        assert_eq!(entry_hash(&a), entry_hash(&a));
        assert_ne!(entry_hash(&entry("one")), entry_hash(&entry("two")));
    }

    #[test]
    fn test_tail_args_defaults() {
        let args = TailArgs::parse_from(["tail"]);
        assert_eq!(args.interval, 5);
        assert_eq!(args.limit, 50);
    }
}
