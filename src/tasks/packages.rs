use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult};
use crate::resources::network::in_subnet;
use crate::resources::package::{BatchOutcome, install_batch};

/// Install the core, DMZ and (outside the DMZ) lab package sets.
#[derive(Debug)]
pub struct InstallLinuxPackages;

impl Task for InstallLinuxPackages {
    fn name(&self) -> &'static str {
        "Install Linux packages"
    }

    fn action(&self) -> Action {
        Action::InstallLinux
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let in_dmz = in_subnet(ctx.network.as_ref(), &ctx.config.dmz_subnet)
            .context("checking DMZ subnet membership")?;
        let packages = linux_package_set(ctx, in_dmz);
        ctx.log.info(&format!(
            "{} host: {} package(s) selected",
            if in_dmz { "DMZ" } else { "lab" },
            packages.len()
        ));
        install_packages(ctx, &packages)?;
        Ok(TaskResult::done(ctx))
    }
}

/// Core + DMZ packages inside the DMZ subnet, plus LAB packages outside it.
fn linux_package_set(ctx: &Context, in_dmz: bool) -> Vec<String> {
    let config = &ctx.config;
    let (core, dmz, lab) = if ctx.platform.is_alpine() {
        (
            &config.alpine_core_packages,
            &config.alpine_dmz_packages,
            &config.alpine_lab_packages,
        )
    } else {
        (
            &config.linux_core_packages,
            &config.linux_dmz_packages,
            &config.linux_lab_packages,
        )
    };
    let mut packages: Vec<String> = core.iter().chain(dmz).cloned().collect();
    if !in_dmz {
        packages.extend(lab.iter().cloned());
    }
    packages
}

/// Install a batch through the platform's package tool, honouring the
/// Proxmox protected patterns.
fn install_packages(ctx: &Context, packages: &[String]) -> Result<BatchOutcome> {
    let protected: &[String] = if ctx.platform.is_proxmox {
        &ctx.config.proxmox_package_patterns
    } else {
        &[]
    };
    let outcome = install_batch(
        ctx.package_tool().as_ref(),
        &ctx.runner(),
        ctx.log.as_ref(),
        packages,
        protected,
        &ctx.config.locale_env(),
    );
    ctx.log.debug(&format!(
        "packages: {} installed, {} present, {} protected, {} failed",
        outcome.installed.len(),
        outcome.skipped.len(),
        outcome.protected.len(),
        outcome.failed.len()
    ));
    Ok(outcome.into_result()?)
}

/// Install the Python system packages, then the pip packages.
#[derive(Debug)]
pub struct InstallPythonPackages;

impl Task for InstallPythonPackages {
    fn name(&self) -> &'static str {
        "Install Python packages"
    }

    fn action(&self) -> Action {
        Action::InstallPython
    }

    fn enabled(&self, _ctx: &Context) -> Result<(), String> {
        Err("runs only with --install-python".to_string())
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let system = if ctx.platform.is_alpine() {
            &ctx.config.alpine_python_packages
        } else {
            &ctx.config.python_packages
        };
        install_packages(ctx, system)?;

        let pip = &ctx.config.pip_packages;
        if pip.is_empty() {
            ctx.log.debug("no pip packages configured");
            return Ok(TaskResult::done(ctx));
        }
        let (program, mut args) = pip_command(ctx);
        args.extend(pip.iter().map(String::as_str));
        ctx.runner()
            .run_with_env(program, &args, &ctx.config.locale_env())
            .context("installing pip packages")?;
        Ok(TaskResult::done(ctx))
    }
}

/// `uv pip install --system` when requested and available, otherwise
/// `pip3 install --break-system-packages`.
fn pip_command(ctx: &Context) -> (&'static str, Vec<&'static str>) {
    if ctx.config.use_uv_package_manager {
        if ctx.runner().which("uv") {
            return ("uv", vec!["pip", "install", "--system"]);
        }
        ctx.log.warn("use_uv_package_manager is set but uv is not installed; using pip3");
    }
    ("pip3", vec!["install", "--break-system-packages"])
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::HardnError;
    use crate::exec::ExecResult;
    use crate::platform::OsFamily;
    use crate::tasks::test_helpers::{RecordingExecutor, TestHost};

    fn not_installed() -> RecordingExecutor {
        RecordingExecutor::new()
            .respond("dpkg-query", ExecResult::failed(1, ""))
            .respond("apk info -e", ExecResult::failed(1, ""))
    }

    fn installs(calls: &[String]) -> Vec<String> {
        calls
            .iter()
            .filter(|c| c.starts_with("apt-get install") || c.starts_with("apk add"))
            .cloned()
            .collect()
    }

    #[test]
    fn dmz_host_skips_lab_packages() {
        let host = TestHost::new(OsFamily::Debian)
            .with_exec(not_installed())
            .with_addrs(&["127.0.0.1", "192.168.4.20"])
            .with_config(|c| {
                c.linux_core_packages = vec!["curl".into()];
                c.linux_dmz_packages = vec!["ufw".into()];
                c.linux_lab_packages = vec!["htop".into()];
            });
        InstallLinuxPackages.run(&host.context()).unwrap();
        assert_eq!(
            installs(&host.exec.calls()),
            vec!["apt-get install -y curl", "apt-get install -y ufw"]
        );
    }

    #[test]
    fn lab_host_gets_all_three_sets() {
        let host = TestHost::new(OsFamily::Alpine)
            .with_exec(not_installed())
            .with_addrs(&["10.0.0.5"])
            .with_config(|c| {
                c.alpine_core_packages = vec!["curl".into()];
                c.alpine_dmz_packages = vec!["fail2ban".into()];
                c.alpine_lab_packages = vec!["htop".into()];
            });
        InstallLinuxPackages.run(&host.context()).unwrap();
        assert_eq!(
            installs(&host.exec.calls()),
            vec!["apk add curl", "apk add fail2ban", "apk add htop"]
        );
    }

    #[test]
    fn one_failure_is_partial_and_rest_installs() {
        let exec = not_installed()
            .respond("apt-get install -y nosuchpkg", ExecResult::failed(100, "E: Unable to locate"));
        let host = TestHost::new(OsFamily::Debian)
            .with_exec(exec)
            .with_config(|c| {
                c.linux_core_packages = vec!["curl".into(), "nosuchpkg".into(), "ufw".into()];
                c.linux_dmz_packages = vec![];
                c.linux_lab_packages = vec![];
            });
        let err = InstallLinuxPackages.run(&host.context()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HardnError>(),
            Some(HardnError::PackageInstallPartial { failed }) if failed == &vec!["nosuchpkg".to_string()]
        ));
        assert!(host.exec.called("apt-get install -y ufw"));
    }

    #[test]
    fn proxmox_never_touches_protected_packages() {
        let host = TestHost::new(OsFamily::Debian)
            .proxmox()
            .with_exec(not_installed())
            .with_config(|c| {
                c.linux_core_packages = vec!["pve-manager".into(), "curl".into()];
                c.linux_dmz_packages = vec![];
                c.linux_lab_packages = vec![];
            });
        InstallLinuxPackages.run(&host.context()).unwrap();
        assert_eq!(
            installs(&host.exec.calls()),
            vec!["apt-get install -y --no-remove curl"]
        );
    }

    #[test]
    fn dry_run_only_queries() {
        let host = TestHost::new(OsFamily::Debian)
            .dry_run()
            .with_exec(not_installed())
            .with_config(|c| c.linux_lab_packages = vec![]);
        let result = InstallLinuxPackages.run(&host.context()).unwrap();
        assert_eq!(result, TaskResult::DryRun);
        assert!(installs(&host.exec.calls()).is_empty());
        assert!(host
            .log
            .dry_run_lines()
            .contains(&"would run: apt-get install -y curl".to_string()));
    }

    #[test]
    fn python_uses_pip_with_break_system_packages() {
        let host = TestHost::new(OsFamily::Debian)
            .with_exec(not_installed())
            .with_config(|c| {
                c.python_packages = vec!["python3-pip".into()];
                c.pip_packages = vec!["requests".into(), "rich".into()];
            });
        InstallPythonPackages.run(&host.context()).unwrap();
        let calls = host.exec.calls();
        assert_eq!(
            calls.last().map(String::as_str),
            Some("pip3 install --break-system-packages requests rich")
        );
        let env = host.exec.env_of("pip3").unwrap();
        assert!(env.contains(&("PYTHONUNBUFFERED".to_string(), "1".to_string())));
    }

    #[test]
    fn python_prefers_uv_when_available() {
        let host = TestHost::new(OsFamily::Alpine)
            .with_exec(not_installed().with_program("uv"))
            .with_config(|c| {
                c.use_uv_package_manager = true;
                c.pip_packages = vec!["requests".into()];
            });
        InstallPythonPackages.run(&host.context()).unwrap();
        assert!(host.exec.called("uv pip install --system requests"));
    }

    #[test]
    fn python_is_left_out_of_full_runs() {
        let host = TestHost::new(OsFamily::Debian);
        assert!(InstallPythonPackages.enabled(&host.context()).is_err());
    }
}
