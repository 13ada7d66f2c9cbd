//! Crosswatch CLI
//!
//! Command-line interface for the Crosswatch event router.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod config;

use commands::run_server;
use config::AppConfig;
use cw_observability::{init_logging_with_config, register_metrics, LoggingConfig};
use cw_policy::PolicySnapshot;

#[derive(Parser)]
#[command(name = "crosswatch")]
#[command(version)]
#[command(about = "Central event router and cross-tenant correlation engine", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the event router
    Serve,

    /// Validate a routing policy file and exit
    CheckPolicy {
        /// Policy file to validate
        file: PathBuf,
    },

    /// Print the effective configuration with secrets redacted
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Serve => {
            init_logging_with_config(logging_config(&config));
            register_metrics();
            run_server(config).await
        }
        Commands::CheckPolicy { file } => {
            match PolicySnapshot::load(&file) {
                Ok(snapshot) => {
                    println!(
                        "{} policy '{}' is valid ({})",
                        "✓".green(),
                        file.display(),
                        snapshot.version
                    );
                    Ok(())
                }
                Err(err) => {
                    eprintln!("{} {}", "✗".red(), err);
                    std::process::exit(1);
                }
            }
        }
        Commands::ShowConfig => {
            let redacted = config.redact_secrets();
            println!("{}", toml::to_string_pretty(&redacted)?);
            Ok(())
        }
    }
}

fn logging_config(config: &AppConfig) -> LoggingConfig {
    match config.logging.mode.as_str() {
        "development" => LoggingConfig::development(),
        "production" => LoggingConfig::production(),
        _ => LoggingConfig::default(),
    }
}
