//! Purge and clear commands
//!
//! `purge` deletes entries matching filters and only works against the
//! database backend — the file backend has no per-entry delete, so the
//! engine's unsupported-operation error is surfaced with a hint instead
//! of partially deleting anything. `clear` wipes the active store
//! unconditionally on either backend.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use commonlog::engine::{Level, LogQuery};
use std::path::Path;

/// Delete log entries matching filters
#[derive(Debug, Clone, Parser)]
pub struct PurgeArgs {
    /// Only delete entries with this level
    #[arg(short, long)]
    pub level: Option<String>,

    /// Only delete entries from this plugin
    #[arg(short, long)]
    pub plugin: Option<String>,

    /// Only delete entries whose message or context contains this term
    #[arg(short, long)]
    pub search: Option<String>,

    /// Count matching entries without deleting them
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the purge command
pub async fn execute(config_path: &Path, args: PurgeArgs) -> Result<()> {
    let engine = super::build_engine(config_path)?;

    let level = match &args.level {
        Some(raw) => Some(
            Level::parse_opt(raw).ok_or_else(|| anyhow::anyhow!("unknown log level '{}'", raw))?,
        ),
        None => None,
    };

    let query = LogQuery {
        level,
        plugin: args.plugin.clone(),
        search: args.search.clone(),
        ..Default::default()
    };

    if args.dry_run {
        let matching = engine.get_logs_count(&query).await?;
        println!("Dry run: {} matching entries found.", matching);
        return Ok(());
    }

    match engine.purge(&query).await {
        Ok(deleted) => {
            println!("{}", format!("{} log entries deleted.", deleted).green());
            Ok(())
        }
        Err(err) if err.is_unsupported() => {
            eprintln!(
                "{}",
                "Purge is only available when using database storage.".red()
            );
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Execute the clear command: unconditionally empty the active store.
pub async fn execute_clear(config_path: &Path) -> Result<()> {
    let engine = super::build_engine(config_path)?;

    engine.clear_logs().await?;
    println!("{}", "Logs cleared successfully.".green());

    Ok(())
}
