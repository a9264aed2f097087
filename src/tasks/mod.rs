//! Named, ordered hardening tasks.
pub mod apparmor;
pub mod context;
pub mod dns;
pub mod firewall;
pub mod lynis;
pub mod packages;
pub mod session;
pub mod sources;
pub mod ssh;
pub mod upgrades;
pub mod user;

/// Implement [`Task::dependencies`] by expanding to the required
/// `fn dependencies(&self) -> &[TypeId]` method body.
///
/// The `const DEPS` intermediate is required because [`std::any::TypeId::of`]
/// is a `const fn`; placing it in a `const` gives the slice the `'static`
/// lifetime the return type needs.
///
/// # Examples
///
/// ```ignore
/// task_deps![super::ssh::ConfigureSsh]
/// // expands to:
/// //   fn dependencies(&self) -> &[std::any::TypeId] {
/// //       const DEPS: &[std::any::TypeId] = &[
/// //           std::any::TypeId::of::<super::ssh::ConfigureSsh>(),
/// //       ];
/// //       DEPS
/// //   }
/// ```
macro_rules! task_deps {
    [$($dep:ty),+ $(,)?] => {
        fn dependencies(&self) -> &[std::any::TypeId] {
            const DEPS: &[std::any::TypeId] = &[$(std::any::TypeId::of::<$dep>()),+];
            DEPS
        }
    };
}

pub(crate) use task_deps;

pub use context::Context;

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;

use anyhow::Result;

use crate::error::{self, HardnError};
use crate::logging::TaskStatus;

/// Result of a single task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Task completed successfully.
    Ok,
    /// Task was skipped with a reason.
    Skipped(String),
    /// Task ran in dry-run mode.
    DryRun,
}

impl TaskResult {
    /// `DryRun` in dry-run mode, `Ok` otherwise.
    #[must_use]
    pub const fn done(ctx: &Context) -> Self {
        if ctx.dry_run { Self::DryRun } else { Self::Ok }
    }
}

/// User-selectable hardening actions, in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    /// Header line and `~/.hushlogin`.
    Session,
    /// Package repository lists.
    ConfigureSources,
    /// Core/DMZ/LAB package sets.
    InstallLinux,
    /// Python system and pip packages.
    InstallPython,
    /// Administrative account, sudo grant and keys.
    CreateUser,
    /// sshd configuration.
    ConfigureSsh,
    /// Root SSH revocation.
    DisableRoot,
    /// UFW bring-up.
    ConfigureUfw,
    /// Resolver configuration.
    ConfigureDns,
    /// AppArmor.
    AppArmor,
    /// Lynis audit.
    Lynis,
    /// Unattended security upgrades.
    UnattendedUpgrades,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::ConfigureSources => "configure-sources",
            Self::InstallLinux => "install-linux",
            Self::InstallPython => "install-python",
            Self::CreateUser => "create-user",
            Self::ConfigureSsh => "configure-ssh",
            Self::DisableRoot => "disable-root",
            Self::ConfigureUfw => "configure-ufw",
            Self::ConfigureDns => "configure-dns",
            Self::AppArmor => "apparmor",
            Self::Lynis => "lynis",
            Self::UnattendedUpgrades => "unattended-upgrades",
        })
    }
}

/// A named, executable task.
///
/// The `'static` bound is required so that each task struct has a stable
/// [`TypeId`] which the orchestrator uses to match dependency declarations.
pub trait Task: Send + Sync + 'static {
    /// Human-readable task name.
    fn name(&self) -> &str;

    /// The action that selects this task.
    fn action(&self) -> Action;

    /// The concrete `TypeId` of this task, used as a dependency identifier.
    fn task_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    /// Tasks whose failure in the same run causes this one to be skipped.
    fn dependencies(&self) -> &[TypeId] {
        &[]
    }

    /// Whether a full run includes this task under the current
    /// configuration.  `Err` carries the reason it is left out.  Explicitly
    /// selected tasks ignore this gate.
    ///
    /// # Errors
    ///
    /// Returns the reason the configuration disables this task.
    fn enabled(&self, _ctx: &Context) -> Result<(), String> {
        Ok(())
    }

    /// Whether this task applies to the current platform.
    fn should_run(&self, ctx: &Context) -> bool;

    /// Execute the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task fails, such as when system commands
    /// fail, file operations are not permitted, or configuration is invalid.
    fn run(&self, ctx: &Context) -> Result<TaskResult>;
}

/// The complete set of tasks, in fixed execution order.
#[must_use]
pub fn all_tasks() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(session::PrepareSession),
        Box::new(sources::ConfigureSources),
        Box::new(packages::InstallLinuxPackages),
        Box::new(packages::InstallPythonPackages),
        Box::new(user::ProvisionUser),
        Box::new(ssh::ConfigureSsh),
        Box::new(ssh::RevokeRootLogin),
        Box::new(firewall::ConfigureFirewall),
        Box::new(dns::ConfigureDns),
        Box::new(apparmor::EnableAppArmor),
        Box::new(lynis::RunLynisAudit),
        Box::new(upgrades::ConfigureUnattendedUpgrades),
    ]
}

/// Terminal outcome of one [`execute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Status recorded for the task.
    pub status: TaskStatus,
    /// Whether the failure must stop the whole run.
    pub halts: bool,
}

/// Execute a task, recording the result in the logger.
pub fn execute(task: &dyn Task, ctx: &Context) -> Outcome {
    let record = |status: TaskStatus, message: Option<&str>| {
        ctx.log.record_task(task.name(), status, message);
        Outcome {
            status,
            halts: false,
        }
    };

    if !task.should_run(ctx) {
        ctx.log
            .debug(&format!("skipping task: {} (not applicable)", task.name()));
        return record(
            TaskStatus::NotApplicable,
            Some(&format!("not applicable on {}", ctx.platform.family)),
        );
    }

    ctx.log.stage(task.name());

    match task.run(ctx) {
        Ok(TaskResult::Ok) => record(TaskStatus::Ok, None),
        Ok(TaskResult::Skipped(reason)) => {
            ctx.log.info(&format!("skipped: {reason}"));
            record(TaskStatus::Skipped, Some(&reason))
        }
        Ok(TaskResult::DryRun) => record(TaskStatus::DryRun, None),
        Err(e) => {
            let partial = e
                .chain()
                .filter_map(|c| c.downcast_ref::<HardnError>())
                .any(|h| matches!(h, HardnError::PackageInstallPartial { .. }));
            if partial {
                ctx.log.warn(&format!("{}: {e:#}", task.name()));
                return record(TaskStatus::Partial, Some(&format!("{e:#}")));
            }
            ctx.log.error(&format!("{}: {e:#}", task.name()));
            let mut outcome = record(TaskStatus::Failed, Some(&format!("{e:#}")));
            outcome.halts = error::halts_run(&e);
            outcome
        }
    }
}

/// Whether [`run_sequence`] consults each task's configuration gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gates {
    /// Tasks disabled by the configuration are recorded as skipped.
    Honor,
    /// Every task runs; the caller selected them explicitly.
    Ignore,
}

/// Run `tasks` in order through [`execute`].
///
/// With [`Gates::Honor`] a task disabled by the configuration is recorded
/// as skipped at its own position.  A task whose dependency failed is
/// skipped.  After a halting error or an interrupt no further task starts;
/// each remaining task is recorded as skipped.
///
/// # Errors
///
/// Returns the halting condition, if one stopped the run.
pub fn run_sequence(tasks: &[&dyn Task], gates: Gates, ctx: &Context) -> Result<()> {
    let mut failed: HashSet<TypeId> = HashSet::new();
    let mut stop_reason: Option<String> = None;

    for task in tasks {
        if gates == Gates::Honor
            && let Err(reason) = task.enabled(ctx)
        {
            ctx.log.debug(&format!("{}: {reason}", task.name()));
            ctx.log.record_task(task.name(), TaskStatus::Skipped, Some(&reason));
            continue;
        }
        if let Some(reason) = &stop_reason {
            ctx.log.record_task(task.name(), TaskStatus::Skipped, Some(reason));
            continue;
        }
        if ctx.is_interrupted() {
            ctx.log.warn("interrupted: no further tasks will start");
            let reason = "interrupted".to_string();
            ctx.log.record_task(task.name(), TaskStatus::Skipped, Some(&reason));
            stop_reason = Some(reason);
            continue;
        }
        if let Some(dep) = tasks
            .iter()
            .find(|t| task.dependencies().contains(&t.task_id()) && failed.contains(&t.task_id()))
        {
            let reason = format!("dependency failed: {}", dep.name());
            ctx.log.warn(&format!("{}: {reason}", task.name()));
            ctx.log.record_task(task.name(), TaskStatus::Skipped, Some(&reason));
            failed.insert(task.task_id());
            continue;
        }

        let outcome = execute(*task, ctx);
        if outcome.status == TaskStatus::Failed {
            failed.insert(task.task_id());
        }
        if outcome.halts {
            stop_reason = Some(format!("run halted after {}", task.name()));
        }
    }

    match stop_reason {
        Some(reason) if reason == "interrupted" => anyhow::bail!("interrupted"),
        Some(reason) => anyhow::bail!(reason),
        None => Ok(()),
    }
}
