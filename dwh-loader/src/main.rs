//! Warehouse loader binary.
//!
//! Copies raw tables into the staging schema and merges staging into the company dimension
//! and the fact tables. One invocation runs one command and exits with a code the scheduler
//! can act on.

use std::process::ExitCode;

use clap::Parser;
use dwh_config::Environment;
use dwh_config::shared::LoaderConfig;
use dwh_telemetry::tracing::init_tracing;
use tracing::error;

use crate::cli::{Cli, Command};
use crate::config::load_loader_config;
use crate::core::run_command;
use crate::error::LoaderResult;

mod cli;
mod config;
mod core;
mod error;

/// Entry point of the loader.
///
/// Parses the command line, loads configuration, initializes tracing and runs the command
/// on a multi-threaded runtime.
fn main() -> LoaderResult<ExitCode> {
    let cli = Cli::parse();

    let loader_config = load_loader_config()?;

    let environment = Environment::load()?;
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), environment.is_prod())?;

    let exit_code = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(loader_config, cli.command, cli.report_json));

    match exit_code {
        Ok(code) => Ok(code),
        Err(err) => {
            error!(error = %err, "dwh loader failed");
            Err(err)
        }
    }
}

async fn async_main(
    loader_config: LoaderConfig,
    command: Command,
    report_json: bool,
) -> LoaderResult<ExitCode> {
    run_command(loader_config, command, report_json).await
}
