//! Export command
//!
//! Write filtered log entries to a file on disk as JSON or CSV.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use commonlog::engine::{export, LogQuery};
use std::path::{Path, PathBuf};

/// Export log entries to a file
#[derive(Debug, Clone, Parser)]
pub struct ExportArgs {
    /// Destination path
    pub path: PathBuf,

    /// File format (json, csv)
    #[arg(short, long, default_value = "json")]
    pub format: String,

    /// Number of log entries to export
    #[arg(long, default_value = "200")]
    pub limit: usize,
}

/// Execute the export command
pub async fn execute(config_path: &Path, args: ExportArgs) -> Result<()> {
    let engine = super::build_engine(config_path)?;

    let query = LogQuery {
        limit: args.limit.max(1),
        ..Default::default()
    };
    let logs = engine.get_logs(&query).await?;

    if logs.is_empty() {
        println!("{}", "No log entries found to export".yellow());
        return Ok(());
    }

    let content = match args.format.to_lowercase().as_str() {
        "csv" => export::to_csv(&logs),
        "json" => export::to_json(&logs)?,
        other => anyhow::bail!("unsupported export format '{}', expected json or csv", other),
    };

    std::fs::write(&args.path, content)
        .with_context(|| format!("failed to write export to {}", args.path.display()))?;

    println!(
        "{}",
        format!("Exported {} log entries to {}", logs.len(), args.path.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_args_defaults() {
        let args = ExportArgs::parse_from(["export", "./out.json"]);
        assert_eq!(args.format, "json");
        assert_eq!(args.limit, 200);
    }
}
