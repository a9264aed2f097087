//! Structured logger with dry-run awareness and summary collection.
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET, TASK_TARGET};
use super::types::{Log, TaskEntry, TaskStatus};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
///
/// The `record_task` method is **not** included because its signature differs
/// from the `fn(&self, &str)` pattern shared by the display methods.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// Every message is forwarded to `tracing`; the global subscriber decides
/// what reaches the console and the append-only log file.  Each terminal
/// task state is also emitted as a structured `hardn::task` event.
#[derive(Debug, Default)]
pub struct Logger {
    tasks: Mutex<Vec<TaskEntry>>,
    log_file: Mutex<Option<PathBuf>>,
}

impl Logger {
    /// Create a new logger with no recorded tasks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the log file path for display in the run summary.
    pub fn set_log_path(&self, path: &Path) {
        if let Ok(mut guard) = self.log_file.lock() {
            *guard = Some(path.to_path_buf());
        }
    }

    /// Return the log file path, if one was attached.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.lock().ok().and_then(|g| g.clone())
    }

    /// Return a clone of all recorded task entries.
    #[must_use]
    pub fn task_entries(&self) -> Vec<TaskEntry> {
        self.tasks.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a task result for the summary and emit its structured line.
    pub fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        tracing::info!(
            target: TASK_TARGET,
            status = status.label(),
            detail = message.unwrap_or(""),
            "{name}"
        );
        if let Ok(mut guard) = self.tasks.lock() {
            guard.push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of tasks that failed fatally.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.tasks.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|t| t.status == TaskStatus::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded tasks.
    pub fn print_summary(&self) {
        let tasks = self.task_entries();
        if tasks.is_empty() {
            return;
        }

        self.stage("Summary");

        let mut ok = 0u32;
        let mut not_applicable = 0u32;
        let mut skipped = 0u32;
        let mut dry_run = 0u32;
        let mut partial = 0u32;
        let mut failed = 0u32;

        for task in &tasks {
            let (icon, color) = match task.status {
                TaskStatus::Ok => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                TaskStatus::NotApplicable => {
                    not_applicable += 1;
                    ("·", "\x1b[2m")
                }
                TaskStatus::Skipped => {
                    skipped += 1;
                    ("○", "\x1b[33m")
                }
                TaskStatus::DryRun => {
                    dry_run += 1;
                    ("~", "\x1b[37m")
                }
                TaskStatus::Partial => {
                    partial += 1;
                    ("!", "\x1b[33m")
                }
                TaskStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = task
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", task.name));
        }

        let total = ok + not_applicable + skipped + dry_run + partial + failed;
        self.info(&format!(
            "{total} tasks: \x1b[32m{ok} ok\x1b[0m, \x1b[2m{not_applicable} n/a\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[37m{dry_run} preview\x1b[0m, \x1b[33m{partial} partial\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = self.log_path() {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.record_task(name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    fn contents(log: &Logger) -> String {
        let path = log.log_path().expect("log path should exist");
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn logger_new() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.task_entries().is_empty(), "expected empty task list");
    }

    #[test]
    fn record_task_with_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_task("Configure DNS", TaskStatus::Skipped, Some("disabled"));
        let tasks = log.task_entries();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Configure DNS");
        assert_eq!(tasks[0].message, Some("disabled".to_string()));
    }

    #[test]
    fn record_task_writes_structured_line() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_task("Configure SSH", TaskStatus::Ok, None);
        let contents = contents(&log);
        assert!(contents.contains("[TASK] Configure SSH"), "{contents}");
        assert!(contents.contains("status=\"succeeded\""), "{contents}");
    }

    #[test]
    fn failure_count_ignores_partial() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_task("a", TaskStatus::Ok, None);
        log.record_task("b", TaskStatus::Partial, Some("1 package failed"));
        assert_eq!(log.failure_count(), 0);
        log.record_task("c", TaskStatus::Failed, Some("error"));
        assert_eq!(log.failure_count(), 1);
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log_ref: &dyn Log = &log;
        log_ref.record_task("via-trait", TaskStatus::Ok, None);
        assert_eq!(log.task_entries().len(), 1);
    }

    #[test]
    fn levels_are_tagged_in_file() {
        let (log, _tmp, _guard) = isolated_logger();
        log.info("info-marker");
        log.warn("warn-marker");
        log.error("error-marker");
        log.dry_run("dryrun-marker");
        log.stage("stage-marker");
        log.debug("debug-marker");
        let contents = contents(&log);
        assert!(contents.contains("[INFO] info-marker"));
        assert!(contents.contains("[WARNING] warn-marker"));
        assert!(contents.contains("[ERROR] error-marker"));
        assert!(contents.contains("[DRY-RUN] dryrun-marker"));
        assert!(contents.contains("==> stage-marker"));
        assert!(contents.contains("debug-marker"));
    }

    #[test]
    fn summary_lists_every_task() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_task("Install packages", TaskStatus::Partial, Some("foo"));
        log.record_task("Configure DNS", TaskStatus::DryRun, None);
        log.print_summary();
        let contents = contents(&log);
        assert!(contents.contains("! Install packages (foo)"), "{contents}");
        assert!(contents.contains("~ Configure DNS"), "{contents}");
        assert!(contents.contains("2 tasks:"), "{contents}");
    }
}
