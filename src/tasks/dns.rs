use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult};
use crate::error::HardnError;

const RESOLVED_CONF: &str = "/etc/systemd/resolved.conf";
const RESOLVCONF_HEAD: &str = "/etc/resolvconf/resolv.conf.d/head";
const RESOLV_CONF: &str = "/etc/resolv.conf";
const SEARCH_DOMAIN: &str = "lan";
/// The C resolver only honours the first few `nameserver` lines.
const MAX_RESOLV_NAMESERVERS: usize = 2;

/// Which resolver stack owns name resolution on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverStack {
    /// `systemd-resolved` is active.
    Resolved,
    /// `resolvconf` is installed.
    Resolvconf,
    /// Plain `/etc/resolv.conf`.
    Direct,
}

/// Detect the resolver stack.
///
/// # Errors
///
/// Returns an error if the supervisor query cannot be spawned.
pub fn detect_stack(ctx: &Context) -> Result<ResolverStack> {
    let runner = ctx.runner();
    if ctx.platform.is_debian() && ctx.supervisor().is_active(&runner, "systemd-resolved")? {
        return Ok(ResolverStack::Resolved);
    }
    if runner.which("resolvconf") {
        return Ok(ResolverStack::Resolvconf);
    }
    Ok(ResolverStack::Direct)
}

/// `[Resolve]` section for systemd-resolved.
#[must_use]
pub fn render_resolved(nameservers: &[String]) -> String {
    format!(
        "[Resolve]\nDNS={}\nDomains={SEARCH_DOMAIN}\n",
        nameservers.join(" ")
    )
}

/// resolv.conf-style text with at most two nameservers.
#[must_use]
pub fn render_resolv(nameservers: &[String]) -> String {
    let mut out = format!("domain {SEARCH_DOMAIN}\nsearch {SEARCH_DOMAIN}\n");
    for ns in nameservers.iter().take(MAX_RESOLV_NAMESERVERS) {
        let _ = writeln!(out, "nameserver {ns}");
    }
    out
}

/// Point the host's resolver at the configured nameservers.
#[derive(Debug)]
pub struct ConfigureDns;

impl Task for ConfigureDns {
    fn name(&self) -> &'static str {
        "Configure DNS"
    }

    fn action(&self) -> Action {
        Action::ConfigureDns
    }

    fn enabled(&self, ctx: &Context) -> Result<(), String> {
        if ctx.config.configure_dns {
            Ok(())
        } else {
            Err("configure_dns is false".to_string())
        }
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let nameservers = &ctx.config.nameservers;
        if nameservers.is_empty() {
            return Err(HardnError::NoNameservers.into());
        }
        let steward = ctx.steward();
        let runner = ctx.runner();
        let stack = detect_stack(ctx)?;
        ctx.log.debug(&format!("resolver stack: {stack:?}"));

        match stack {
            ResolverStack::Resolved => {
                let change =
                    steward.write(Path::new(RESOLVED_CONF), &render_resolved(nameservers), 0o644)?;
                if change.changed_or_previewed() {
                    ctx.supervisor()
                        .restart(&runner, "systemd-resolved")
                        .context("restarting systemd-resolved")?;
                }
            }
            ResolverStack::Resolvconf => {
                let change =
                    steward.write(Path::new(RESOLVCONF_HEAD), &render_resolv(nameservers), 0o644)?;
                if change.changed_or_previewed() {
                    runner
                        .run("resolvconf", &["-u"])
                        .context("regenerating resolv.conf")?;
                }
            }
            ResolverStack::Direct => {
                steward.write(Path::new(RESOLV_CONF), &render_resolv(nameservers), 0o644)?;
            }
        }
        Ok(TaskResult::done(ctx))
    }
}
