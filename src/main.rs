use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use commonlog::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    init_tracing();

    match args.command {
        cli::Commands::Logs(logs_args) => {
            commands::logs::execute(&args.config, logs_args).await?;
        }
        cli::Commands::Export(export_args) => {
            commands::export::execute(&args.config, export_args).await?;
        }
        cli::Commands::Tail(tail_args) => {
            commands::tail::execute(&args.config, tail_args).await?;
        }
        cli::Commands::Purge(purge_args) => {
            commands::purge::execute(&args.config, purge_args).await?;
        }
        cli::Commands::Clear => {
            commands::purge::execute_clear(&args.config).await?;
        }
        cli::Commands::Report(report_args) => {
            commands::report::execute(&args.config, report_args).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
    }

    Ok(())
}
