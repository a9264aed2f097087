//! Command: `setup-sudo-env`.
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::commands::run::require_root;
use crate::exec::{CommandRunner, SystemExecutor};
use crate::logging::Log;
use crate::platform;
use crate::resources::steward::{FileSteward, StewardOptions};
use crate::tasks::user::install_sudo_env;

/// The account that invoked sudo: `SUDO_USER`, else `USER`.
#[must_use]
pub fn invoking_user(sudo_user: Option<String>, user: Option<String>) -> Option<String> {
    sudo_user
        .filter(|u| !u.is_empty())
        .or(user)
        .filter(|u| !u.is_empty())
}

/// Install the `HARDN_CONFIG` sudo environment drop-in for the invoking user.
///
/// # Errors
///
/// Returns an error if the process is not root (outside dry-run), no
/// invoking user can be determined, or the drop-in is rejected.
pub fn run(dry_run: bool, log: &dyn Log) -> Result<()> {
    require_root(platform::effective_uid(), dry_run, log)?;
    let user = invoking_user(std::env::var("SUDO_USER").ok(), std::env::var("USER").ok())
        .context("cannot determine the invoking user (SUDO_USER and USER are unset)")?;

    let opts = StewardOptions {
        dry_run,
        ..StewardOptions::default()
    };
    let steward = FileSteward::new(Path::new("/"), opts, log);
    let runner = CommandRunner::new(&SystemExecutor, log, dry_run);
    let change = install_sudo_env(&steward, &runner, &user)?;
    if change.is_applied() {
        log.info(&format!("{user} now keeps HARDN_CONFIG across sudo"));
    }
    Ok(())
}
