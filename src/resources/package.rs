//! Package manager capability and batch installs.
use anyhow::Result;

use crate::error::HardnError;
use crate::exec::CommandRunner;
use crate::logging::Log;

/// A family's package tool.
pub trait PackageTool: Send + Sync + std::fmt::Debug {
    /// Tool name for log lines.
    fn name(&self) -> &'static str;

    /// Whether `package` is installed.  Always queried, even in dry-run.
    ///
    /// # Errors
    ///
    /// Returns an error if the query tool cannot be spawned.
    fn is_installed(&self, runner: &CommandRunner<'_>, package: &str) -> Result<bool>;

    /// Install one package non-interactively.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::CommandFailed`] if the tool exits non-zero.
    fn install(&self, runner: &CommandRunner<'_>, package: &str, env: &[(&str, &str)])
    -> Result<()>;

    /// Refresh the package index.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::CommandFailed`] if the tool exits non-zero.
    fn update_index(&self, runner: &CommandRunner<'_>, env: &[(&str, &str)]) -> Result<()>;
}

/// `apt-get` / `dpkg-query` on the Debian family.
#[derive(Debug, Clone, Copy, Default)]
pub struct Apt {
    /// Refuse to remove anything as a side effect of an install (Proxmox).
    pub no_remove: bool,
}

const APT_ENV: (&str, &str) = ("DEBIAN_FRONTEND", "noninteractive");

fn with_apt_env<'e>(env: &[(&'e str, &'e str)]) -> Vec<(&'e str, &'e str)> {
    std::iter::once(APT_ENV).chain(env.iter().copied()).collect()
}

impl PackageTool for Apt {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn is_installed(&self, runner: &CommandRunner<'_>, package: &str) -> Result<bool> {
        let result = runner.query("dpkg-query", &["-W", "-f=${Status}", package])?;
        Ok(result.success() && result.stdout.contains("install ok installed"))
    }

    fn install(
        &self,
        runner: &CommandRunner<'_>,
        package: &str,
        env: &[(&str, &str)],
    ) -> Result<()> {
        let mut args = vec!["install", "-y"];
        if self.no_remove {
            args.push("--no-remove");
        }
        args.push(package);
        runner.run_with_env("apt-get", &args, &with_apt_env(env))?;
        Ok(())
    }

    fn update_index(&self, runner: &CommandRunner<'_>, env: &[(&str, &str)]) -> Result<()> {
        runner.run_with_env("apt-get", &["update"], &with_apt_env(env))?;
        Ok(())
    }
}

/// `apk` on Alpine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Apk;

impl PackageTool for Apk {
    fn name(&self) -> &'static str {
        "apk"
    }

    fn is_installed(&self, runner: &CommandRunner<'_>, package: &str) -> Result<bool> {
        Ok(runner.query("apk", &["info", "-e", package])?.success())
    }

    fn install(
        &self,
        runner: &CommandRunner<'_>,
        package: &str,
        env: &[(&str, &str)],
    ) -> Result<()> {
        runner.run_with_env("apk", &["add", package], env)?;
        Ok(())
    }

    fn update_index(&self, runner: &CommandRunner<'_>, env: &[(&str, &str)]) -> Result<()> {
        runner.run_with_env("apk", &["update"], env)?;
        Ok(())
    }
}

/// Match `name` against a pattern where `*` stands for any run of
/// characters.
#[must_use]
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let Some((first, rest)) = parts.split_first() else {
        return pattern == name;
    };
    let Some(mut remaining) = name.strip_prefix(first) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for part in middle {
        match remaining.find(part) {
            Some(idx) => remaining = remaining.get(idx + part.len()..).unwrap_or_default(),
            None => return false,
        }
    }
    remaining.ends_with(last)
}

/// Per-package outcome of [`install_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Newly installed (or previewed) packages.
    pub installed: Vec<String>,
    /// Packages that were already present.
    pub skipped: Vec<String>,
    /// Packages left alone because they match a protected pattern.
    pub protected: Vec<String>,
    /// Packages whose install failed.
    pub failed: Vec<String>,
}

impl BatchOutcome {
    /// Fold failures into [`HardnError::PackageInstallPartial`].
    ///
    /// # Errors
    ///
    /// Returns the partial-install error when any package failed.
    pub fn into_result(self) -> Result<Self, HardnError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(HardnError::PackageInstallPartial {
                failed: self.failed,
            })
        }
    }
}

/// Install every package in order, skipping those already present.
///
/// One failure is logged and does not stop the batch.  Packages matching any
/// of `protected` are never touched.
pub fn install_batch(
    tool: &dyn PackageTool,
    runner: &CommandRunner<'_>,
    log: &dyn Log,
    packages: &[String],
    protected: &[String],
    env: &[(&str, &str)],
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for package in packages {
        if protected.iter().any(|p| matches_pattern(p, package)) {
            log.warn(&format!("{package}: protected package, not touching"));
            outcome.protected.push(package.clone());
            continue;
        }
        match tool.is_installed(runner, package) {
            Ok(true) => {
                log.debug(&format!("{package}: already installed"));
                outcome.skipped.push(package.clone());
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                log.warn(&format!("{package}: cannot query install state: {e:#}"));
            }
        }
        match tool.install(runner, package, env) {
            Ok(()) => {
                if !runner.dry_run() {
                    log.info(&format!("{package}: installed"));
                }
                outcome.installed.push(package.clone());
            }
            Err(e) => {
                log.error(&format!("{package}: install failed: {e:#}"));
                outcome.failed.push(package.clone());
            }
        }
    }
    outcome
}
