pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod registry;
mod validation;

use std::process::ExitCode;

use clap::Parser;

/// Binary entry point: parse arguments, run the command on a tokio runtime,
/// and map the outcome to a process exit code.
pub fn run() -> ExitCode {
    logging::init();
    let cli = cli::Cli::parse();

    tracing::info!("Starting routine-advisor v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::execute(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind(), "{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
