use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::exec::{CommandRunner, Executor};
use crate::logging::Log;
use crate::platform::Platform;
use crate::resources::network::AddressSource;
use crate::resources::package::PackageTool;
use crate::resources::service::ServiceSupervisor;
use crate::resources::steward::{FileSteward, StewardOptions};

/// Shared context for task execution.
pub struct Context {
    /// Configuration, fixed for the whole run.
    pub config: Arc<Config>,
    /// Detected platform information.
    pub platform: Arc<Platform>,
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Whether to perform a dry run (preview changes without applying).
    pub dry_run: bool,
    /// Directory host paths are resolved under (`/` in production).
    pub root: PathBuf,
    /// Home directory of the invoking account (host path).
    pub home: PathBuf,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Source of interface addresses for the subnet check.
    pub network: Arc<dyn AddressSource>,
    /// Set by the interrupt handler; no task starts once it is raised.
    pub interrupted: Arc<AtomicBool>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &"<Config>")
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("root", &self.root)
            .field("home", &self.home)
            .field("executor", &self.executor)
            .field("network", &"<dyn AddressSource>")
            .field("interrupted", &self.interrupted)
            .finish()
    }
}

impl Context {
    /// Creates a new context for task execution.
    ///
    /// `dry_run` is taken from the configuration.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        platform: Arc<Platform>,
        log: Arc<dyn Log>,
        executor: Arc<dyn Executor>,
        network: Arc<dyn AddressSource>,
    ) -> Self {
        let dry_run = config.dry_run;
        Self {
            config,
            platform,
            log,
            dry_run,
            root: PathBuf::from("/"),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root")),
            executor,
            network,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resolve host paths under `root` instead of `/`.
    #[must_use]
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = root;
        self
    }

    /// Use `home` as the invoking account's home directory.
    #[must_use]
    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = home;
        self
    }

    /// Share an existing interrupt flag.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Dry-run-aware command runner.
    #[must_use]
    pub fn runner(&self) -> CommandRunner<'_> {
        CommandRunner::new(self.executor.as_ref(), self.log.as_ref(), self.dry_run)
    }

    /// Dry-run-aware file steward rooted at `root`.
    #[must_use]
    pub fn steward(&self) -> FileSteward<'_> {
        let mut opts = StewardOptions::from_config(&self.config);
        opts.dry_run = self.dry_run;
        FileSteward::new(&self.root, opts, self.log.as_ref())
    }

    /// The platform's package tool.
    #[must_use]
    pub fn package_tool(&self) -> Box<dyn PackageTool> {
        self.platform.package_tool()
    }

    /// The platform's service supervisor.
    #[must_use]
    pub fn supervisor(&self) -> Box<dyn ServiceSupervisor> {
        self.platform.service_supervisor()
    }

    /// Whether an interrupt has been received.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}
