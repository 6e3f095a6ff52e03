//! `mediamover` command line entry point.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use crate::cli::Cli;
use crate::logging::LogSettings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = LogSettings::for_cli(cli.verbose);
    // Keep the guard alive so file logs are flushed on exit.
    let _guard = match logging::init(&settings) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: file logging disabled: {e}");
            logging::init(&settings.without_file()).ok()
        }
    };
    info!("mediamover {} starting", env!("CARGO_PKG_VERSION"));

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
