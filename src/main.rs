use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser as _;

use hardn::cli::Cli;
use hardn::commands;
use hardn::logging::{self, Logger};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let cli = Cli::parse();
    let sink = logging::init_subscriber(cli.verbose, cli.silent);
    let log = Arc::new(Logger::new());

    match commands::dispatch(&cli, &log, &sink) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
