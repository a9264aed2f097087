use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult};
use crate::error::HardnError;
use crate::exec::CommandRunner;
use crate::platform::OsFamily;
use crate::resources::ResourceChange;
use crate::resources::steward::FileSteward;

const SUDOERS_DIR: &str = "/etc/sudoers.d";
const SUDO_ENV_FILE: &str = "/etc/sudoers.d/hardn-env";

/// Create the administrative account and reconcile its group, sudo grant
/// and authorized keys.
#[derive(Debug)]
pub struct ProvisionUser;

impl Task for ProvisionUser {
    fn name(&self) -> &'static str {
        "Provision admin user"
    }

    fn action(&self) -> Action {
        Action::CreateUser
    }

    fn enabled(&self, ctx: &Context) -> Result<(), String> {
        if ctx.config.username.is_empty() {
            Err("no username configured".to_string())
        } else {
            Ok(())
        }
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let user = ctx.config.username.as_str();
        if user.is_empty() {
            anyhow::bail!("username is required (set `username` or pass --username)");
        }
        let runner = ctx.runner();
        let steward = ctx.steward();

        if user_exists(&runner, user)? {
            ctx.log.info(&format!("user {user} already exists"));
        } else {
            create_user(&runner, ctx.platform.family, user)
                .with_context(|| format!("creating user {user}"))?;
            if !ctx.dry_run {
                ctx.log.info(&format!("created user {user}"));
            }
        }

        grant_admin_group(&runner, ctx.platform.family, user)
            .with_context(|| format!("adding {user} to {}", ctx.platform.admin_group()))?;

        let sudoers = sudoers_line(user, ctx.config.sudo_no_password);
        install_sudoers(
            &steward,
            &runner,
            &Path::new(SUDOERS_DIR).join(user),
            &sudoers,
        )?;

        if ctx.config.ssh_keys.is_empty() {
            ctx.log
                .warn("ssh_keys is empty; leaving authorized_keys untouched");
        } else {
            let home = home_dir(&runner, user)?;
            install_keys(&steward, &runner, user, &home, &ctx.config.ssh_keys)?;
        }

        Ok(TaskResult::done(ctx))
    }
}

fn user_exists(runner: &CommandRunner<'_>, user: &str) -> Result<bool> {
    Ok(runner.query("id", &["-u", user])?.success())
}

fn create_user(runner: &CommandRunner<'_>, family: OsFamily, user: &str) -> Result<()> {
    match family {
        OsFamily::Debian => {
            runner.run("useradd", &["--create-home", "--shell", "/bin/bash", user])?;
        }
        OsFamily::Alpine => {
            runner.run("adduser", &["-D", "-s", "/bin/ash", user])?;
        }
    }
    Ok(())
}

fn grant_admin_group(runner: &CommandRunner<'_>, family: OsFamily, user: &str) -> Result<()> {
    match family {
        OsFamily::Debian => {
            runner.run("usermod", &["-aG", "sudo", user])?;
        }
        OsFamily::Alpine => {
            runner.run("addgroup", &[user, "wheel"])?;
        }
    }
    Ok(())
}

/// The sudoers grant for `user`.
#[must_use]
pub fn sudoers_line(user: &str, no_password: bool) -> String {
    if no_password {
        format!("{user} ALL=(ALL) NOPASSWD:ALL\n")
    } else {
        format!("{user} ALL=(ALL) ALL\n")
    }
}

/// Validate `contents` with `visudo -c -f` and install it at `target`
/// (mode 0440).  Nothing is validated or written when `target` already
/// holds exactly these contents.
///
/// # Errors
///
/// Returns [`HardnError::SudoersInvalid`] if visudo rejects the fragment,
/// and the steward's errors if the write fails.
pub fn install_sudoers(
    steward: &FileSteward<'_>,
    runner: &CommandRunner<'_>,
    target: &Path,
    contents: &str,
) -> Result<ResourceChange> {
    if steward.read(target)?.as_deref() == Some(contents) {
        return steward.write(target, contents, 0o440);
    }
    if !steward.dry_run() {
        validate_sudoers(runner, target, contents)?;
    }
    steward.write(target, contents, 0o440)
}

fn validate_sudoers(runner: &CommandRunner<'_>, target: &Path, contents: &str) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix("hardn-sudoers")
        .tempfile()
        .map_err(|e| HardnError::io("create temp file for", target, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| HardnError::io("write", tmp.path(), e))?;
    let tmp_path = tmp.path().to_string_lossy().to_string();
    let result = runner.query("visudo", &["-c", "-f", &tmp_path])?;
    if !result.success() {
        return Err(HardnError::SudoersInvalid {
            target: target.to_path_buf(),
            output: result.combined(),
        }
        .into());
    }
    Ok(())
}

/// Home directory from `getent passwd`, defaulting to `/home/<user>`.
fn home_dir(runner: &CommandRunner<'_>, user: &str) -> Result<PathBuf> {
    let result = runner.query("getent", &["passwd", user])?;
    let home = result
        .success()
        .then(|| result.stdout.lines().next().and_then(|l| l.split(':').nth(5)))
        .flatten()
        .filter(|h| !h.is_empty())
        .map_or_else(|| PathBuf::from("/home").join(user), PathBuf::from);
    Ok(home)
}

fn install_keys(
    steward: &FileSteward<'_>,
    runner: &CommandRunner<'_>,
    user: &str,
    home: &Path,
    keys: &[String],
) -> Result<()> {
    let ssh_dir = home.join(".ssh");
    steward.create_dir(&ssh_dir, 0o700)?;
    let mut contents = keys.join("\n");
    contents.push('\n');
    steward.write(&ssh_dir.join("authorized_keys"), &contents, 0o600)?;
    let owner = format!("{user}:{user}");
    let dir = ssh_dir.to_string_lossy();
    runner
        .run("chown", &["-R", &owner, &dir])
        .with_context(|| format!("setting ownership of {dir}"))?;
    Ok(())
}

/// Let `user` keep `HARDN_CONFIG` across sudo.
///
/// # Errors
///
/// Returns [`HardnError::SudoersInvalid`] if visudo rejects the fragment,
/// and the steward's errors if the write fails.
pub fn install_sudo_env(
    steward: &FileSteward<'_>,
    runner: &CommandRunner<'_>,
    user: &str,
) -> Result<ResourceChange> {
    let contents = format!("Defaults:{user} env_keep += \"HARDN_CONFIG\"\n");
    install_sudoers(steward, runner, Path::new(SUDO_ENV_FILE), &contents)
}
