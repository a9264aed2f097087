pub mod logs;
pub mod run;
pub mod sudo_env;
pub mod version;

use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory as _;

use crate::cli::{Cli, Command};
use crate::logging::{LogSink, Logger};

/// Route parsed arguments to the matching command.
///
/// With no subcommand and no action flag the help text is printed.
///
/// # Errors
///
/// Returns the error of the command that ran.
pub fn dispatch(cli: &Cli, log: &Arc<Logger>, sink: &LogSink) -> Result<()> {
    if cli.version {
        version::run();
        return Ok(());
    }
    if cli.command == Some(Command::SetupSudoEnv) {
        return sudo_env::run(cli.dry_run, log.as_ref());
    }
    if cli.print_logs {
        return logs::run(cli);
    }
    let Some(selection) = cli.actions.selection() else {
        Cli::command().print_help()?;
        return Ok(());
    };
    run::run(cli, &selection, log, sink)
}
