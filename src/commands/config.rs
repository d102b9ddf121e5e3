//! Configuration display and validation commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

/// Display the effective configuration (defaults + file + environment).
pub fn show(config_path: &Path) -> Result<()> {
    let cfg = commonlog::config::load_config(config_path)?;

    let rendered = toml::to_string_pretty(&cfg).context("failed to render configuration")?;
    println!("{}", rendered);

    Ok(())
}

/// Validate the configuration file.
pub fn validate(config_path: &Path) -> Result<()> {
    match commonlog::config::load_config(config_path) {
        Ok(cfg) => {
            println!(
                "{}",
                format!(
                    "Configuration is valid (storage mode: {})",
                    cfg.storage.mode
                )
                .green()
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", format!("Configuration is invalid: {:#}", err).red());
            Err(err)
        }
    }
}
