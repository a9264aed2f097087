use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult, task_deps};
use crate::config::{AppProfile, FirewallPolicy};

const PROFILE_FILE: &str = "/etc/ufw/applications.d/hardn";

/// Bring up UFW with a default-deny inbound policy and an SSH rule.
#[derive(Debug)]
pub struct ConfigureFirewall;

impl Task for ConfigureFirewall {
    fn name(&self) -> &'static str {
        "Configure firewall"
    }

    fn action(&self) -> Action {
        Action::ConfigureUfw
    }

    task_deps![super::ssh::ConfigureSsh];

    fn enabled(&self, ctx: &Context) -> Result<(), String> {
        if ctx.config.enable_ufw_ssh_policy {
            Ok(())
        } else {
            Err("enable_ufw_ssh_policy is false".to_string())
        }
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let runner = ctx.runner();
        let config = &ctx.config;
        if config.ssh_port == 22 {
            ctx.log
                .warn("SSH is allowed on port 22; a non-standard ssh_port reduces scan noise");
        }

        let tool = ctx.package_tool();
        if !tool.is_installed(&runner, "ufw")? {
            tool.install(&runner, "ufw", &config.locale_env())
                .context("installing ufw")?;
        }

        advise_policy("incoming", config.ufw_default_incoming_policy, FirewallPolicy::Deny, ctx);
        advise_policy("outgoing", config.ufw_default_outgoing_policy, FirewallPolicy::Allow, ctx);
        runner.run("ufw", &["default", "deny", "incoming"])?;
        runner.run("ufw", &["default", "allow", "outgoing"])?;

        let ssh_rule = format!("{}/tcp", config.ssh_port);
        runner
            .run("ufw", &["allow", &ssh_rule, "comment", "SSH"])
            .context("allowing SSH")?;

        for port in config.ufw_allowed_ports.iter().filter(|p| **p != config.ssh_port) {
            let rule = format!("{port}/tcp");
            if let Err(e) = runner.run("ufw", &["allow", &rule]) {
                ctx.log.warn(&format!("ufw allow {rule} failed: {e:#}"));
            }
        }

        if !config.ufw_app_profiles.is_empty() {
            ctx.steward().write(
                Path::new(PROFILE_FILE),
                &render_profiles(&config.ufw_app_profiles),
                0o644,
            )?;
            for profile in &config.ufw_app_profiles {
                runner
                    .run("ufw", &["allow", &profile.name])
                    .with_context(|| format!("enabling application profile {}", profile.name))?;
            }
        }

        runner.run("ufw", &["--force", "enable"])?;
        if ctx.platform.is_alpine() {
            ctx.supervisor().enable_now(&runner, "ufw")?;
        }
        Ok(TaskResult::done(ctx))
    }
}

/// Configured defaults are advisory: the firewall always denies incoming
/// and allows outgoing traffic.
fn advise_policy(direction: &str, configured: FirewallPolicy, applied: FirewallPolicy, ctx: &Context) {
    if configured != applied {
        ctx.log.info(&format!(
            "ufw_default_{direction}_policy is {configured}; applying {applied}"
        ));
    }
}

/// Render UFW application profiles in its INI format.
#[must_use]
pub fn render_profiles(profiles: &[AppProfile]) -> String {
    let mut out = String::new();
    for (i, profile) in profiles.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "[{}]", profile.name);
        let title = if profile.title.is_empty() {
            &profile.name
        } else {
            &profile.title
        };
        let _ = writeln!(out, "title={title}");
        let _ = writeln!(out, "description={}", profile.description);
        let _ = writeln!(out, "ports={}", profile.ports.join(","));
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::ExecResult;
    use crate::platform::OsFamily;
    use crate::tasks::test_helpers::{RecordingExecutor, TestHost};

    fn proxmox_profile() -> AppProfile {
        AppProfile {
            name: "proxmox".into(),
            title: "Proxmox VE".into(),
            description: "Web UI".into(),
            ports: vec!["8006/tcp".into()],
        }
    }

    #[test]
    fn debian_sequence() {
        let host = TestHost::new(OsFamily::Debian).with_config(|c| {
            c.ssh_port = 2208;
            c.ufw_allowed_ports = [443, 80].into_iter().collect();
            c.ufw_app_profiles = vec![proxmox_profile()];
        });
        ConfigureFirewall.run(&host.context()).unwrap();
        assert_eq!(
            host.exec.calls(),
            vec![
                "dpkg-query -W -f=${Status} ufw",
                "apt-get install -y ufw",
                "ufw default deny incoming",
                "ufw default allow outgoing",
                "ufw allow 2208/tcp comment SSH",
                "ufw allow 80/tcp",
                "ufw allow 443/tcp",
                "ufw allow proxmox",
                "ufw --force enable",
            ]
        );
        insta::assert_snapshot!(host.read(PROFILE_FILE), @r"
        [proxmox]
        title=Proxmox VE
        description=Web UI
        ports=8006/tcp
        ");
    }

    #[test]
    fn alpine_enables_service() {
        let host = TestHost::new(OsFamily::Alpine);
        ConfigureFirewall.run(&host.context()).unwrap();
        let calls = host.exec.calls();
        assert!(!calls.iter().any(|c| c.starts_with("apk add")));
        assert_eq!(
            calls.get(calls.len() - 2..).unwrap(),
            ["rc-update add ufw default", "rc-service ufw start"]
        );
    }

    #[test]
    fn extra_port_failure_is_not_fatal() {
        let exec = RecordingExecutor::new()
            .respond("ufw allow 8080/tcp", ExecResult::failed(1, "ERROR: bad port"));
        let host = TestHost::new(OsFamily::Debian)
            .with_exec(exec)
            .with_config(|c| c.ufw_allowed_ports = [8080].into_iter().collect());
        ConfigureFirewall.run(&host.context()).unwrap();
        assert!(host.exec.called("ufw --force enable"));
        assert!(host.log.contains("ufw allow 8080/tcp failed"));
    }

    #[test]
    fn profile_failure_is_fatal() {
        let exec =
            RecordingExecutor::new().respond("ufw allow proxmox", ExecResult::failed(1, "ERROR"));
        let host = TestHost::new(OsFamily::Debian)
            .with_exec(exec)
            .with_config(|c| c.ufw_app_profiles = vec![proxmox_profile()]);
        assert!(ConfigureFirewall.run(&host.context()).is_err());
        assert!(!host.exec.called("ufw --force enable"));
    }

    #[test]
    fn differing_policy_is_advisory() {
        let host = TestHost::new(OsFamily::Debian)
            .with_config(|c| c.ufw_default_incoming_policy = FirewallPolicy::Reject);
        ConfigureFirewall.run(&host.context()).unwrap();
        assert!(host.log.contains("ufw_default_incoming_policy is reject; applying deny"));
        assert!(host.exec.called("ufw default deny incoming"));
    }

    #[test]
    fn profiles_list_every_port() {
        let profile = AppProfile {
            ports: vec!["30443/tcp".into(), "8443/tcp".into()],
            ..proxmox_profile()
        };
        insta::assert_snapshot!(render_profiles(&[profile]), @r"
        [proxmox]
        title=Proxmox VE
        description=Web UI
        ports=30443/tcp,8443/tcp
        ");
    }

    #[test]
    fn default_port_draws_an_advisory() {
        let host = TestHost::new(OsFamily::Debian);
        ConfigureFirewall.run(&host.context()).unwrap();
        assert!(host.log.contains("allowed on port 22;"));

        let host = TestHost::new(OsFamily::Debian).with_config(|c| c.ssh_port = 2208);
        ConfigureFirewall.run(&host.context()).unwrap();
        assert!(!host.log.contains("allowed on port 22;"));
    }

    #[test]
    fn dry_run_previews_every_rule() {
        let host = TestHost::new(OsFamily::Debian).dry_run();
        let result = ConfigureFirewall.run(&host.context()).unwrap();
        assert_eq!(result, TaskResult::DryRun);
        let lines = host.log.dry_run_lines();
        assert!(lines.contains(&"would run: ufw allow 22/tcp comment SSH".to_string()));
        assert!(lines.contains(&"would run: ufw --force enable".to_string()));
        assert!(!host.exec.called("ufw"));
    }
}
