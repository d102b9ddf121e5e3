//! Command implementations for the CLI
//!
//! This module contains the implementation of all CLI commands:
//! - logs: query stored entries with filters and pagination
//! - export: write filtered entries to a JSON or CSV file
//! - tail: poll for new entries and stream them to the console
//! - purge/clear: delete entries (filtered or unconditional)
//! - report: aggregate error statistics
//! - config: configuration display and validation

pub mod config;
pub mod export;
pub mod logs;
pub mod purge;
pub mod report;
pub mod tail;

use anyhow::Result;
use commonlog::engine::LogEngine;
use std::path::Path;

/// Load the configuration at `path` and build an engine around it.
pub fn build_engine(path: &Path) -> Result<LogEngine> {
    let cfg = commonlog::config::load_config(path)?;
    Ok(LogEngine::new(cfg.into_shared()))
}
