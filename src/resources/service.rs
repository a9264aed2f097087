//! Service supervisor capability.
use anyhow::Result;

use crate::exec::CommandRunner;

/// A family's init system.
pub trait ServiceSupervisor: Send + Sync + std::fmt::Debug {
    /// Supervisor name for log lines.
    fn name(&self) -> &'static str;

    /// Whether `unit` is running.  Always queried, even in dry-run.
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor cannot be spawned.
    fn is_active(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<bool>;

    /// Restart `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::HardnError::CommandFailed`] on failure.
    fn restart(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<()>;

    /// Enable `unit` at boot and start it now.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::HardnError::CommandFailed`] on failure.
    fn enable_now(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<()>;

    /// Pick up changed unit files.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::HardnError::CommandFailed`] on failure.
    fn reload_units(&self, runner: &CommandRunner<'_>) -> Result<()>;
}

/// systemd via `systemctl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemd;

impl ServiceSupervisor for Systemd {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn is_active(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<bool> {
        Ok(runner.query("systemctl", &["is-active", unit])?.success())
    }

    fn restart(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<()> {
        runner.run("systemctl", &["restart", unit])?;
        Ok(())
    }

    fn enable_now(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<()> {
        runner.run("systemctl", &["enable", "--now", unit])?;
        Ok(())
    }

    fn reload_units(&self, runner: &CommandRunner<'_>) -> Result<()> {
        runner.run("systemctl", &["daemon-reload"])?;
        Ok(())
    }
}

/// OpenRC via `rc-service` / `rc-update`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRc;

impl ServiceSupervisor for OpenRc {
    fn name(&self) -> &'static str {
        "openrc"
    }

    fn is_active(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<bool> {
        Ok(runner.query("rc-service", &[unit, "status"])?.success())
    }

    fn restart(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<()> {
        runner.run("rc-service", &[unit, "restart"])?;
        Ok(())
    }

    fn enable_now(&self, runner: &CommandRunner<'_>, unit: &str) -> Result<()> {
        runner.run("rc-update", &["add", unit, "default"])?;
        runner.run("rc-service", &[unit, "start"])?;
        Ok(())
    }

    fn reload_units(&self, _runner: &CommandRunner<'_>) -> Result<()> {
        Ok(())
    }
}
