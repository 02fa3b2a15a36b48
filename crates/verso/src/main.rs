mod cli;
mod commands;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use verso_backend::{EngineError, ErrorKind};
use verso_core::{Config, Engine};
use verso_platform::AppPaths;

use crate::cli::Cli;

/// sysexits(3) code for a failure of the given kind.
fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Usage => 64,
        ErrorKind::NotFound => 66,
        ErrorKind::Unavailable => 69,
        ErrorKind::Software => 70,
        ErrorKind::Io => 74,
        ErrorKind::Unsupported => 78,
    }
}

async fn run(cli: Cli, paths: &AppPaths) -> Result<(), EngineError> {
    let config = Config::load(paths);
    let pin_file_name = config.pin_file_name.clone();
    let engine = Engine::from_config(config)?;
    let cwd = std::env::current_dir()
        .map_err(|error| EngineError::io("failed to read current directory", &error))?;

    commands::run(cli.command, &engine, &pin_file_name, &cwd).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("verso: {error}");
            return ExitCode::from(exit_code(ErrorKind::Unsupported));
        }
    };
    logging::init_logging(&paths, cli.verbose, logging::MAX_LOG_SIZE);
    info!("verso {} starting", env!("CARGO_PKG_VERSION"));

    match run(cli, &paths).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!("{failure}");
            eprintln!("verso: {failure}");
            ExitCode::from(exit_code(failure.kind()))
        }
    }
}
