use std::fmt::Write as _;
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult, task_deps};
use crate::config::Config;
use crate::error::HardnError;
use crate::resources::ResourceChange;

const ALPINE_SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
const SOCKET_OVERRIDE: &str = "/etc/systemd/system/ssh.socket.d/listen.conf";
const ALPINE_SFTP: &str = "Subsystem sftp /usr/lib/ssh/sftp-server";

/// Render the managed sshd configuration.
#[must_use]
pub fn render_sshd_config(config: &Config, with_sftp: bool) -> String {
    let mut out = String::from("# Managed by hardn\n");
    let listen = listen_address(&config.ssh_listen_address, config.ssh_port);
    let permit_root = if config.permit_root_login { "yes" } else { "no" };
    let _ = writeln!(out, "Protocol 2");
    let _ = writeln!(out, "Port {}", config.ssh_port);
    let _ = writeln!(out, "ListenAddress {listen}");
    let _ = writeln!(out, "PermitRootLogin {permit_root}");
    let _ = writeln!(out, "StrictModes yes");
    let _ = writeln!(out, "PubkeyAuthentication yes");
    let _ = writeln!(out, "PasswordAuthentication no");
    let _ = writeln!(out, "PermitEmptyPasswords no");
    let _ = writeln!(out, "AuthenticationMethods publickey");
    let users = config.effective_allowed_users();
    if !users.is_empty() {
        let _ = writeln!(out, "AllowUsers {}", users.join(" "));
    }
    let _ = writeln!(
        out,
        "AuthorizedKeysFile .ssh/authorized_keys {}/authorized_keys",
        config.ssh_key_path.trim_end_matches('/')
    );
    if with_sftp {
        let _ = writeln!(out, "{ALPINE_SFTP}");
    }
    out
}

/// `ListenAddress` value: `addr` as given when it already names a port,
/// otherwise `addr:port` (`[addr]:port` for a bare IPv6 address).
fn listen_address(addr: &str, port: u16) -> String {
    if addr.starts_with('[') {
        return if addr.contains("]:") {
            addr.to_string()
        } else {
            format!("{addr}:{port}")
        };
    }
    if addr.parse::<Ipv6Addr>().is_ok() {
        return format!("[{addr}]:{port}");
    }
    match addr.rsplit_once(':') {
        Some((host, p)) if !host.contains(':') && p.parse::<u16>().is_ok() => addr.to_string(),
        _ => format!("{addr}:{port}"),
    }
}

/// systemd socket override so `ssh.socket` listens on the configured port.
#[must_use]
pub fn render_socket_override(port: u16) -> String {
    format!("[Socket]\nListenStream=\nListenStream={port}\n")
}

/// The sshd configuration file hardn manages on this platform.
fn active_config_path(ctx: &Context) -> PathBuf {
    if ctx.platform.is_alpine() {
        PathBuf::from(ALPINE_SSHD_CONFIG)
    } else {
        ctx.config.ssh_config_file.clone()
    }
}

fn ssh_unit(ctx: &Context) -> &'static str {
    if ctx.platform.is_alpine() { "sshd" } else { "ssh" }
}

/// Restart the SSH daemon, and its socket unit when socket activation is on.
fn restart_ssh(ctx: &Context) -> Result<()> {
    let runner = ctx.runner();
    let supervisor = ctx.supervisor();
    supervisor
        .restart(&runner, ssh_unit(ctx))
        .context("restarting the SSH daemon")?;
    if ctx.platform.is_debian()
        && runner
            .query("systemctl", &["is-enabled", "ssh.socket"])?
            .success()
    {
        supervisor
            .restart(&runner, "ssh.socket")
            .context("restarting ssh.socket")?;
    }
    Ok(())
}

/// Write the hardened sshd configuration and restart the daemon.
#[derive(Debug)]
pub struct ConfigureSsh;

impl Task for ConfigureSsh {
    fn name(&self) -> &'static str {
        "Configure SSH"
    }

    fn action(&self) -> Action {
        Action::ConfigureSsh
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let steward = ctx.steward();
        let runner = ctx.runner();

        let config_change = steward.write(
            &active_config_path(ctx),
            &render_sshd_config(&ctx.config, ctx.platform.is_alpine()),
            0o644,
        )?;

        let mut restart = config_change.changed_or_previewed();
        if ctx.platform.is_debian() {
            let socket_change = steward.write(
                Path::new(SOCKET_OVERRIDE),
                &render_socket_override(ctx.config.ssh_port),
                0o644,
            )?;
            if socket_change.changed_or_previewed() {
                ctx.supervisor().reload_units(&runner)?;
                restart = true;
            }
        }

        if restart {
            restart_ssh(ctx)?;
        } else {
            ctx.log.info("sshd configuration already up to date");
        }
        Ok(TaskResult::done(ctx))
    }
}

/// Rewrite sshd configuration text so root cannot log in.
///
/// `PermitRootLogin yes…` becomes `PermitRootLogin no`; `root` is removed
/// from every `AllowUsers` line.  A line that listed only `root` names
/// `admin` instead, and is dropped only when `admin` is empty.
#[must_use]
pub fn revoke_root(text: &str, admin: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_start();
        let mut words = trimmed.split_whitespace();
        match words.next() {
            Some("PermitRootLogin") if words.next().is_some_and(|v| v.starts_with("yes")) => {
                out.push_str("PermitRootLogin no");
            }
            Some("AllowUsers") => {
                let tokens: Vec<&str> = words.collect();
                if tokens.contains(&"root") {
                    let mut users: Vec<&str> =
                        tokens.into_iter().filter(|u| *u != "root").collect();
                    if users.is_empty() && !admin.is_empty() {
                        users.push(admin);
                    }
                    // An empty AllowUsers line is a syntax error for sshd.
                    if users.is_empty() {
                        continue;
                    }
                    let _ = write!(out, "AllowUsers {}", users.join(" "));
                } else {
                    out.push_str(line);
                }
            }
            _ => out.push_str(line),
        }
        out.push('\n');
    }
    if !text.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }
    out
}

/// Remove root's SSH access from the active configuration.
#[derive(Debug)]
pub struct RevokeRootLogin;

impl Task for RevokeRootLogin {
    fn name(&self) -> &'static str {
        "Revoke root SSH login"
    }

    fn action(&self) -> Action {
        Action::DisableRoot
    }

    task_deps![ConfigureSsh];

    fn enabled(&self, ctx: &Context) -> Result<(), String> {
        if ctx.config.disable_root {
            Ok(())
        } else {
            Err("disable_root is false".to_string())
        }
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let path = active_config_path(ctx);
        let steward = ctx.steward();
        if !steward.exists(&path) {
            if ctx.dry_run {
                ctx.log.dry_run(&format!(
                    "would revoke root login in {} (not written yet)",
                    path.display()
                ));
                return Ok(TaskResult::DryRun);
            }
            return Err(HardnError::SshConfigMissing { path }.into());
        }
        match steward.transform(&path, |text| revoke_root(text, &ctx.config.username))? {
            ResourceChange::AlreadyCorrect => {
                ctx.log.info("root SSH login already revoked");
                Ok(TaskResult::Skipped("already revoked".to_string()))
            }
            _ => {
                restart_ssh(ctx)?;
                Ok(TaskResult::done(ctx))
            }
        }
    }
}
