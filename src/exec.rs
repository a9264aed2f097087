//! External command execution.
//!
//! [`Executor`] is the seam between the engine and the host: the system
//! implementation spawns real processes, tests substitute a recording fake.
//! [`CommandRunner`] layers dry-run gating and typed failures on top.
use std::os::unix::process::CommandExt as _;
use std::process::{Command, Output, Stdio};

use anyhow::{Context as _, Result};

use crate::error::HardnError;
use crate::logging::Log;

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExecResult {
    /// A successful result carrying `stdout`.
    #[must_use]
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    /// A failed result with exit `code` and `stderr`.
    #[must_use]
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.to_string(),
            code: Some(code),
        }
    }

    /// Whether the process exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Standard output followed by standard error.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        }
    }
}

/// Trait for executing external commands, enabling test injection.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a command to completion and return its result without
    /// interpreting the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str], env: &[(&str, &str)])
    -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Production executor that spawns real processes.
///
/// Children are placed in their own process group so that a terminal
/// interrupt reaches only `hardn`; the tool currently running finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_unchecked(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).process_group(0);
        for (k, v) in env {
            cmd.env(k, v);
        }
        let output = cmd
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Render `program args…` for log lines.
fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

/// Dry-run-aware command runner borrowed from the task context.
///
/// Mutating tools go through [`run`](Self::run), which only logs in dry-run
/// mode; read-only queries go through [`query`](Self::query), which always
/// executes.
#[derive(Clone, Copy)]
pub struct CommandRunner<'a> {
    executor: &'a dyn Executor,
    log: &'a dyn Log,
    dry_run: bool,
}

impl std::fmt::Debug for CommandRunner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner")
            .field("executor", &self.executor)
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl<'a> CommandRunner<'a> {
    /// Create a runner over `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor, log: &'a dyn Log, dry_run: bool) -> Self {
        Self {
            executor,
            log,
            dry_run,
        }
    }

    /// Whether mutations are only previewed.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run a mutating command.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::CommandFailed`] on a non-zero exit, or an error
    /// if the process could not be spawned.
    pub fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        self.run_with_env(program, args, &[])
    }

    /// Run a mutating command with extra environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::CommandFailed`] on a non-zero exit, or an error
    /// if the process could not be spawned.
    pub fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExecResult> {
        let rendered = render(program, args);
        if self.dry_run {
            self.log.dry_run(&format!("would run: {rendered}"));
            return Ok(ExecResult::ok(""));
        }
        self.log.debug(&format!("$ {rendered}"));
        let result = self.executor.run_unchecked(program, args, env)?;
        if !result.success() {
            return Err(HardnError::CommandFailed {
                program: program.to_string(),
                args: args.iter().map(|a| (*a).to_string()).collect(),
                output: result.combined(),
                code: result.code,
            }
            .into());
        }
        Ok(result)
    }

    /// Run a read-only query; executed even in dry-run mode and never fails
    /// on exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be spawned.
    pub fn query(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        self.log.debug(&format!("? {}", render(program, args)));
        self.executor.run_unchecked(program, args, &[])
    }

    /// Check if a program is available on `PATH`.
    #[must_use]
    pub fn which(&self, program: &str) -> bool {
        self.executor.which(program)
    }
}
