//! Report command
//!
//! Aggregate error statistics over a trailing window: counts by level,
//! the noisiest plugins and themes, and daily totals. Requires the
//! database backend.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use commonlog::engine::entry::slug_label;
use std::path::Path;

/// Aggregate error statistics
#[derive(Debug, Clone, Parser)]
pub struct ReportArgs {
    /// Number of days to look back
    #[arg(short, long, default_value = "7")]
    pub days: u32,

    /// Output format (text, json)
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,
}

/// Execute the report command
pub async fn execute(config_path: &Path, args: ReportArgs) -> Result<()> {
    let engine = super::build_engine(config_path)?;

    let insights = match engine.error_insights(args.days.max(1)).await {
        Ok(insights) => insights,
        Err(err) if err.is_unsupported() => {
            eprintln!(
                "{}",
                "Reports are only available when using database storage.".red()
            );
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("Log activity over the last {} days", insights.period_days).bold()
    );
    println!();

    println!("{}", "By level:".bold());
    for (level, count) in &insights.level_counts {
        println!("  {:<8} {}", level, count);
    }

    if !insights.top_plugins.is_empty() {
        println!();
        println!("{}", "Top plugins:".bold());
        for (slug, count) in &insights.top_plugins {
            println!("  {:<24} {}", slug_label(slug), count);
        }
    }

    if !insights.top_themes.is_empty() {
        println!();
        println!("{}", "Top themes:".bold());
        for (slug, count) in &insights.top_themes {
            println!("  {:<24} {}", slug_label(slug), count);
        }
    }

    if !insights.daily_totals.is_empty() {
        println!();
        println!("{}", "Daily totals:".bold());
        for (day, count) in &insights.daily_totals {
            println!("  {}  {}", day, count);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_args_defaults() {
        let args = ReportArgs::parse_from(["report"]);
        assert_eq!(args.days, 7);
        assert_eq!(args.format, "text");
    }
}
