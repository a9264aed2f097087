use std::path::Path;

use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult};
use crate::platform::Platform;
use crate::resources::package::install_batch;

const UNATTENDED_CONF: &str = "/etc/apt/apt.conf.d/50unattended-upgrades";
const AUTO_UPGRADES_CONF: &str = "/etc/apt/apt.conf.d/20auto-upgrades";

const AUTO_UPGRADES: &str = "APT::Periodic::Update-Package-Lists \"1\";\nAPT::Periodic::Unattended-Upgrade \"1\";\n";

/// Security-only origins for unattended-upgrades.
#[must_use]
pub fn render_unattended(platform: &Platform) -> String {
    let origins = if platform.id == "ubuntu" {
        "        \"${distro_id}:${distro_codename}-security\";\n        \"${distro_id}ESMApps:${distro_codename}-apps-security\";\n"
    } else {
        "        \"origin=Debian,codename=${distro_codename},label=Debian-Security\";\n        \"origin=Debian,codename=${distro_codename}-security,label=Debian-Security\";\n"
    };
    let key = if platform.id == "ubuntu" {
        "Allowed-Origins"
    } else {
        "Origins-Pattern"
    };
    format!(
        "// Managed by hardn: security updates only.\nUnattended-Upgrade::{key} {{\n{origins}}};\nUnattended-Upgrade::Remove-Unused-Dependencies \"false\";\nUnattended-Upgrade::Automatic-Reboot \"false\";\n"
    )
}

/// Install unattended-upgrades restricted to security updates.
#[derive(Debug)]
pub struct ConfigureUnattendedUpgrades;

impl Task for ConfigureUnattendedUpgrades {
    fn name(&self) -> &'static str {
        "Configure unattended upgrades"
    }

    fn action(&self) -> Action {
        Action::UnattendedUpgrades
    }

    fn enabled(&self, ctx: &Context) -> Result<(), String> {
        if ctx.config.enable_unattended_upgrades {
            Ok(())
        } else {
            Err("enable_unattended_upgrades is false".to_string())
        }
    }

    fn should_run(&self, ctx: &Context) -> bool {
        ctx.platform.is_debian()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let runner = ctx.runner();
        install_batch(
            ctx.package_tool().as_ref(),
            &runner,
            ctx.log.as_ref(),
            &["unattended-upgrades".to_string()],
            &[],
            &ctx.config.locale_env(),
        )
        .into_result()?;

        let steward = ctx.steward();
        steward.write(
            Path::new(UNATTENDED_CONF),
            &render_unattended(&ctx.platform),
            0o644,
        )?;
        steward.write(Path::new(AUTO_UPGRADES_CONF), AUTO_UPGRADES, 0o644)?;

        ctx.supervisor()
            .enable_now(&runner, "unattended-upgrades")
            .context("enabling unattended-upgrades")?;
        Ok(TaskResult::done(ctx))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::platform::OsFamily;
    use crate::tasks::test_helpers::TestHost;

    #[test]
    fn debian_origins_are_security_only() {
        let host = TestHost::new(OsFamily::Debian);
        ConfigureUnattendedUpgrades.run(&host.context()).unwrap();
        insta::assert_snapshot!(host.read(UNATTENDED_CONF), @r#"
        // Managed by hardn: security updates only.
        Unattended-Upgrade::Origins-Pattern {
                "origin=Debian,codename=${distro_codename},label=Debian-Security";
                "origin=Debian,codename=${distro_codename}-security,label=Debian-Security";
        };
        Unattended-Upgrade::Remove-Unused-Dependencies "false";
        Unattended-Upgrade::Automatic-Reboot "false";
        "#);
        assert_eq!(host.read(AUTO_UPGRADES_CONF), AUTO_UPGRADES);
        assert!(host.exec.called("systemctl enable --now unattended-upgrades"));
    }

    #[test]
    fn ubuntu_uses_allowed_origins() {
        let mut platform = Platform::new(OsFamily::Debian, "24.04", "noble", false);
        platform.id = "ubuntu".into();
        let rendered = render_unattended(&platform);
        assert!(rendered.contains("Allowed-Origins"));
        assert!(rendered.contains("${distro_codename}-security"));
    }

    #[test]
    fn not_applicable_on_alpine() {
        let host = TestHost::new(OsFamily::Alpine);
        assert!(!ConfigureUnattendedUpgrades.should_run(&host.context()));
    }
}
