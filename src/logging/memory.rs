//! In-memory logger for tests and embedding front-ends.
use std::sync::Mutex;

use super::types::{Log, TaskEntry, TaskStatus};

/// A single captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    /// A stage header.
    Stage(String),
    /// An informational message.
    Info(String),
    /// A debug message.
    Debug(String),
    /// A warning.
    Warn(String),
    /// An error.
    Error(String),
    /// A dry-run preview of a mutation.
    DryRun(String),
}

impl LogLine {
    /// The message text, whatever the level.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Stage(m)
            | Self::Info(m)
            | Self::Debug(m)
            | Self::Warn(m)
            | Self::Error(m)
            | Self::DryRun(m) => m,
        }
    }
}

/// Implement the display methods of [`Log`] by capturing each message into
/// `self.lines` as the corresponding [`LogLine`] variant.
macro_rules! capture_log_methods {
    ($($method:ident => $variant:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                if let Ok(mut guard) = self.lines.lock() {
                    guard.push(LogLine::$variant(msg.to_string()));
                }
            }
        )+
    };
}

/// Logger that keeps every line and task result in memory.
///
/// Nothing reaches `tracing`, so it can be used without a global subscriber.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<LogLine>>,
    tasks: Mutex<Vec<TaskEntry>>,
}

impl MemoryLog {
    /// Create an empty in-memory log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured line, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Every recorded task result, in order.
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskEntry> {
        self.tasks.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Messages captured at the dry-run level.
    #[must_use]
    pub fn dry_run_lines(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                LogLine::DryRun(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Whether any captured line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.text().contains(needle))
    }

    /// Status recorded for the task called `name`, if any.
    #[must_use]
    pub fn status_of(&self, name: &str) -> Option<TaskStatus> {
        self.tasks()
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.status)
    }
}

impl Log for MemoryLog {
    capture_log_methods! {
        stage   => Stage,
        info    => Info,
        debug   => Debug,
        warn    => Warn,
        error   => Error,
        dry_run => DryRun,
    }

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.tasks.lock() {
            guard.push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }
}
