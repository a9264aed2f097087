//! Command: print the log file.
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::Cli;
use crate::config::resolve::{self, ResolveEnv};
use crate::platform;

/// Print the configured log file to stdout.
///
/// The configuration is resolved without prompting; when it cannot be
/// loaded the default log path is used.
///
/// # Errors
///
/// Returns an error if the log file exists but cannot be read.
pub fn run(cli: &Cli) -> Result<()> {
    let path = log_path(cli);
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            print!("{text}");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("no log file at {}", path.display());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

fn log_path(cli: &Cli) -> PathBuf {
    let env = ResolveEnv {
        interactive: false,
        ..ResolveEnv::from_process(platform::effective_uid() == 0)
    };
    resolve::resolve(cli.config.as_deref(), &env, true, &mut |_| false)
        .map(|(config, _)| config.log_file)
        .unwrap_or_else(|_| crate::config::Config::default().log_file)
}
