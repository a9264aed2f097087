//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::utils::{format_local_datetime, strip_ansi};
use crate::error::HardnError;

/// Target used for stage headers.
pub(super) const STAGE_TARGET: &str = "hardn::stage";
/// Target used for dry-run previews.
pub(super) const DRY_RUN_TARGET: &str = "hardn::dry_run";
/// Target used for structured task terminal-state lines.
pub(super) const TASK_TARGET: &str = "hardn::task";

/// Extracts the `message` field and any structured fields from an event.
#[derive(Default)]
struct MessageExtractor {
    message: String,
    fields: String,
}

impl MessageExtractor {
    fn push_field(&mut self, name: &str, value: &str) {
        if name == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {name}={value:?}");
        }
    }
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push_field(field.name(), &format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push_field(field.name(), value);
    }
}

/// Handle to the append-only log file shared with the [`FileLayer`].
///
/// The subscriber is installed before the configuration is known, so the
/// file is attached afterwards via [`LogSink::attach`].  Until then file
/// output is dropped.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    file: Arc<Mutex<Option<fs::File>>>,
}

impl LogSink {
    /// Open `path` for appending (creating it and its directory if needed)
    /// and route all subsequent events to it.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::FileIo`] if the directory or file cannot be
    /// created.
    pub fn attach(&self, path: &Path) -> Result<(), HardnError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| HardnError::io("create", parent, e))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| HardnError::io("open", path, e))?;
        if let Ok(mut guard) = self.file.lock() {
            *guard = Some(file);
        }
        Ok(())
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut guard) = self.file.lock()
            && let Some(f) = guard.as_mut()
        {
            writeln!(f, "{line}").ok();
        }
    }
}

/// A [`tracing_subscriber::Layer`] that appends every event to the log file
/// as `YYYY-MM-DD HH:MM:SS [LEVEL] message`, ANSI codes stripped.
#[derive(Debug)]
pub(super) struct FileLayer {
    sink: LogSink,
}

impl FileLayer {
    pub(super) const fn new(sink: LogSink) -> Self {
        Self { sink }
    }
}

/// Render the file line for an event.
fn file_line(level: tracing::Level, target: &str, msg: &str, fields: &str) -> String {
    let ts = format_local_datetime();
    let msg = strip_ansi(msg);
    match (level, target) {
        (tracing::Level::INFO, STAGE_TARGET) => format!("{ts} [INFO] ==> {msg}"),
        (tracing::Level::INFO, DRY_RUN_TARGET) => format!("{ts} [DRY-RUN] {msg}"),
        (tracing::Level::INFO, TASK_TARGET) => format!("{ts} [TASK] {msg}{fields}"),
        (tracing::Level::ERROR, _) => format!("{ts} [ERROR] {msg}"),
        (tracing::Level::WARN, _) => format!("{ts} [WARNING] {msg}"),
        (tracing::Level::DEBUG | tracing::Level::TRACE, _) => format!("{ts} [DEBUG] {msg}"),
        _ => format!("{ts} [INFO] {msg}"),
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        self.sink.write_line(&file_line(
            *metadata.level(),
            metadata.target(),
            &extractor.message,
            &extractor.fields,
        ));
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] that emits hardn-style console
/// output.
struct HardnFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for HardnFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let level = *metadata.level();
        let target = metadata.target();

        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let msg = &extractor.message;

        match level {
            tracing::Level::ERROR => writeln!(writer, "\x1b[31m[ERROR]\x1b[0m {msg}"),
            tracing::Level::WARN => writeln!(writer, "\x1b[33m[WARNING]\x1b[0m {msg}"),
            tracing::Level::INFO if target == STAGE_TARGET => {
                writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m")
            }
            tracing::Level::INFO if target == DRY_RUN_TARGET => {
                writeln!(writer, "  \x1b[33m[DRY-RUN]\x1b[0m {msg}")
            }
            tracing::Level::INFO => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// The console layer shows `INFO` and above (`DEBUG` with `verbose`, only
/// errors with `silent`); structured task lines are kept out of the console
/// because the run summary already shows them.  The returned [`LogSink`]
/// receives every event at `DEBUG` and above once a file is attached.
/// Must be called once at program startup, before any logging.
#[must_use]
pub fn init_subscriber(verbose: bool, silent: bool) -> LogSink {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if silent {
        LevelFilter::ERROR
    } else if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(HardnFormatter)
        .with_writer(make_writer)
        .with_filter(console_level)
        .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
            meta.target() != TASK_TARGET
        }));

    let sink = LogSink::default();
    let file_layer = FileLayer::new(sink.clone()).with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    sink
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn file_line_tags_levels() {
        let line = file_line(tracing::Level::ERROR, "hardn", "boom", "");
        assert!(line.ends_with("[ERROR] boom"), "{line}");
        let line = file_line(tracing::Level::WARN, "hardn", "careful", "");
        assert!(line.ends_with("[WARNING] careful"), "{line}");
        let line = file_line(tracing::Level::INFO, DRY_RUN_TARGET, "write x", "");
        assert!(line.ends_with("[DRY-RUN] write x"), "{line}");
        let line = file_line(tracing::Level::INFO, STAGE_TARGET, "SSH", "");
        assert!(line.ends_with("[INFO] ==> SSH"), "{line}");
    }

    #[test]
    fn file_line_appends_structured_fields_for_tasks() {
        let line = file_line(
            tracing::Level::INFO,
            TASK_TARGET,
            "Configure SSH",
            " status=\"succeeded\"",
        );
        assert!(line.ends_with("[TASK] Configure SSH status=\"succeeded\""));
    }

    #[test]
    fn file_line_strips_ansi() {
        let line = file_line(tracing::Level::INFO, "hardn", "\x1b[32mok\x1b[0m", "");
        assert!(line.ends_with("[INFO] ok"));
    }

    #[test]
    fn sink_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/hardn.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "previous run\n").unwrap();

        let sink = LogSink::default();
        sink.attach(&path).unwrap();
        sink.write_line("this run");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "previous run\nthis run\n");
    }

    #[test]
    fn sink_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("var/log/hardn.log");
        LogSink::default().attach(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unattached_sink_drops_lines() {
        let sink = LogSink::default();
        sink.write_line("nowhere");
    }
}
