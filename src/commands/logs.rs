//! Logs query command
//!
//! Query and display stored log entries from the active backend.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use commonlog::engine::{Level, LogEntry, LogQuery};
use std::path::Path;

/// Query and display logs
#[derive(Debug, Clone, Parser)]
pub struct LogsArgs {
    /// Filter by log level (ERROR, WARNING, NOTICE, INFO, DEBUG)
    #[arg(short, long)]
    pub level: Option<String>,

    /// Filter by originating plugin
    #[arg(short, long)]
    pub plugin: Option<String>,

    /// Substring search over message, summary and context
    #[arg(short, long)]
    pub search: Option<String>,

    /// Maximum number of results
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Row offset (database backend only)
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Output format (text, json)
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,
}

impl LogsArgs {
    pub fn to_query(&self) -> Result<LogQuery> {
        let level = match &self.level {
            Some(raw) => Some(
                Level::parse_opt(raw)
                    .ok_or_else(|| anyhow::anyhow!("unknown log level '{}'", raw))?,
            ),
            None => None,
        };

        Ok(LogQuery {
            limit: self.limit,
            offset: self.offset,
            level,
            plugin: self.plugin.clone(),
            search: self.search.clone(),
            fetch_limit: None,
        })
    }
}

/// Execute the logs command
pub async fn execute(config_path: &Path, args: LogsArgs) -> Result<()> {
    let engine = super::build_engine(config_path)?;

    let query = args.to_query()?;
    let logs = engine.get_logs(&query).await?;
    let total = engine.get_logs_count(&query).await?;

    if logs.is_empty() {
        println!("{}", "No log entries found matching the criteria".yellow());
        return Ok(());
    }

    match args.format.as_str() {
        "json" => {
            println!("{}", commonlog::engine::export::to_json(&logs)?);
        }
        _ => {
            display_logs_text(&logs, total);
        }
    }

    Ok(())
}

/// Display logs in human-friendly text format
pub fn display_logs_text(logs: &[LogEntry], total: u64) {
    println!(
        "{}",
        format!("Showing {} of {} log entries", logs.len(), total).bold()
    );
    println!();

    for log in logs {
        println!(
            "{} {} {}",
            log.logged_at.dimmed(),
            colorize_level(&log.level),
            log.message
        );

        if !log.issue_summary.is_empty() {
            println!("  {}", log.issue_summary.dimmed());
        }

        if !log.origin_plugin.is_empty() {
            println!("  {}", format!("plugin: {}", log.origin_plugin).dimmed());
        }
    }
}

pub fn colorize_level(level: &str) -> colored::ColoredString {
    match level {
        "ERROR" => level.red().bold(),
        "WARNING" => level.yellow().bold(),
        "NOTICE" => level.cyan(),
        "INFO" => level.green(),
        "DEBUG" => level.blue(),
        _ => level.normal(),
    }
}
