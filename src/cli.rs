use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "commonlog", version, about = "Dual-backend structured log store")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "commonlog.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Query stored log entries
    Logs(crate::commands::logs::LogsArgs),

    /// Export log entries to a JSON or CSV file
    Export(crate::commands::export::ExportArgs),

    /// Continuously stream new log entries to the console
    Tail(crate::commands::tail::TailArgs),

    /// Delete log entries matching filters (database backend only)
    Purge(crate::commands::purge::PurgeArgs),

    /// Unconditionally empty the active backend's store
    Clear,

    /// Aggregate error statistics (database backend only)
    Report(crate::commands::report::ReportArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display the effective configuration
    Show,

    /// Validate the configuration file
    Validate,
}
