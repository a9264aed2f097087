use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult};
use crate::resources::package::install_batch;

const PACKAGES: [&str; 2] = ["apparmor", "apparmor-utils"];

/// Install AppArmor and enable it at boot.
#[derive(Debug)]
pub struct EnableAppArmor;

impl Task for EnableAppArmor {
    fn name(&self) -> &'static str {
        "Enable AppArmor"
    }

    fn action(&self) -> Action {
        Action::AppArmor
    }

    fn enabled(&self, ctx: &Context) -> Result<(), String> {
        if ctx.config.enable_app_armor {
            Ok(())
        } else {
            Err("enable_app_armor is false".to_string())
        }
    }

    fn should_run(&self, ctx: &Context) -> bool {
        ctx.platform.is_debian()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let runner = ctx.runner();
        let packages: Vec<String> = PACKAGES.iter().map(|p| (*p).to_string()).collect();
        install_batch(
            ctx.package_tool().as_ref(),
            &runner,
            ctx.log.as_ref(),
            &packages,
            &[],
            &ctx.config.locale_env(),
        )
        .into_result()?;
        ctx.supervisor()
            .enable_now(&runner, "apparmor")
            .context("enabling apparmor")?;
        Ok(TaskResult::done(ctx))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::ExecResult;
    use crate::platform::OsFamily;
    use crate::tasks::test_helpers::{RecordingExecutor, TestHost};

    #[test]
    fn not_applicable_on_alpine() {
        let host = TestHost::new(OsFamily::Alpine);
        assert!(!EnableAppArmor.should_run(&host.context()));
    }

    #[test]
    fn installs_and_enables() {
        let exec = RecordingExecutor::new().respond("dpkg-query", ExecResult::failed(1, ""));
        let host = TestHost::new(OsFamily::Debian).with_exec(exec);
        EnableAppArmor.run(&host.context()).unwrap();
        let calls = host.exec.calls();
        assert!(calls.contains(&"apt-get install -y apparmor".to_string()));
        assert!(calls.contains(&"apt-get install -y apparmor-utils".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("systemctl enable --now apparmor"));
    }

    #[test]
    fn gated_by_flag() {
        let host = TestHost::new(OsFamily::Debian);
        assert!(EnableAppArmor.enabled(&host.context()).is_err());
        let host = host.with_config(|c| c.enable_app_armor = true);
        assert!(EnableAppArmor.enabled(&host.context()).is_ok());
    }
}
