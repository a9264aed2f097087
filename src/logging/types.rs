//! Core logging types: task entries, status, and the [`Log`] trait.
use std::fmt;

/// Task execution result for summary reporting.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    /// Human-readable task name.
    pub name: String,
    /// Final status of the task.
    pub status: TaskStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Terminal state of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Action completed successfully.
    Ok,
    /// Action does not apply to this platform or was not enabled.
    NotApplicable,
    /// Action was skipped (dependency failed, run interrupted, nothing to do).
    Skipped,
    /// Action ran in dry-run mode; no changes were applied.
    DryRun,
    /// Action completed but some steps failed non-fatally.
    Partial,
    /// Action failed and could not complete.
    Failed,
}

impl TaskStatus {
    /// Stable label written to the structured task line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "succeeded",
            Self::NotApplicable => "not-applicable",
            Self::Skipped => "skipped",
            Self::DryRun => "preview",
            Self::Partial => "failed-non-fatal",
            Self::Failed => "failed-fatal",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Abstraction over logging backends.
///
/// The engine never logs through globals: every component receives a
/// `&dyn Log` (usually via the task context).  [`Logger`](super::Logger)
/// forwards to `tracing`; [`MemoryLog`](super::MemoryLog) captures lines in
/// memory for embedding front-ends and tests.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a would-be mutation in dry-run mode.
    fn dry_run(&self, msg: &str);
    /// Record a task result for the summary.
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>);
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn task_status_equality() {
        assert_eq!(TaskStatus::Ok, TaskStatus::Ok);
        assert_ne!(TaskStatus::Ok, TaskStatus::Failed);
        assert_ne!(TaskStatus::Partial, TaskStatus::Failed);
        assert_ne!(TaskStatus::Skipped, TaskStatus::DryRun);
    }

    #[test]
    fn task_status_labels_follow_state_machine() {
        assert_eq!(TaskStatus::DryRun.to_string(), "preview");
        assert_eq!(TaskStatus::Ok.to_string(), "succeeded");
        assert_eq!(TaskStatus::Partial.to_string(), "failed-non-fatal");
        assert_eq!(TaskStatus::Failed.to_string(), "failed-fatal");
    }

    #[test]
    fn task_entry_clone() {
        let entry = TaskEntry {
            name: "Configure SSH".to_string(),
            status: TaskStatus::Ok,
            message: Some("restarted ssh".to_string()),
        };
        let cloned = entry.clone();
        assert_eq!(cloned.name, entry.name);
        assert_eq!(cloned.status, entry.status);
        assert_eq!(cloned.message, entry.message);
    }
}
