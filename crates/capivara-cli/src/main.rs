//! Command-line front end for the Capivara game records system.
//!
//! # Startup Sequence
//!
//! 1. Parse arguments
//! 2. Load configuration from `capivara-config.yaml` (defaults if absent)
//! 3. Initialize structured logging (tracing, to stderr)
//! 4. Probe for the relational client and load the JSON documents
//! 5. Run the requested command
//!
//! The relational credential is read from `CAPIVARA_DB_PASSWORD` or asked
//! for on the terminal the first time a statement runs.

mod cli;
mod commands;
mod credential;
mod error;
mod output;

use std::path::Path;
use std::process::ExitCode;

use capivara_core::config::{CapivaraConfig, LoggingConfig};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);
    info!(
        data_dir = %config.storage.data_dir.display(),
        database = %config.relational.database,
        port = config.relational.port,
        "Configuration loaded"
    );

    match commands::run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration from `path`, or defaults when it does not exist.
fn load_config(path: &Path) -> Result<CapivaraConfig, CliError> {
    if path.exists() {
        Ok(CapivaraConfig::from_file(path)?)
    } else {
        let mut config = CapivaraConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
