//! Command: run the selected hardening actions.
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::cli::{Cli, Selection};
use crate::config::Config;
use crate::config::example;
use crate::config::resolve::{self, Overrides, ResolveEnv};
use crate::error::HardnError;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, LogSink, Logger};
use crate::platform::{self, Platform};
use crate::resources::network::SystemAddressSource;
use crate::tasks::{self, Context, Gates, Task};

/// Run the selected actions against this host.
///
/// # Errors
///
/// Returns an error if the process is not root (outside dry-run), the
/// configuration cannot be resolved, the platform is unsupported, the run
/// was halted, or any action failed.
pub fn run(cli: &Cli, selection: &Selection, log: &Arc<Logger>, sink: &LogSink) -> Result<()> {
    let uid = platform::effective_uid();
    require_root(uid, cli.dry_run, log.as_ref())?;

    log.stage("Loading configuration");
    let env = ResolveEnv::from_process(uid == 0);
    let (mut config, source) = resolve::resolve(
        cli.config.as_deref(),
        &env,
        cli.dry_run,
        &mut resolve::ask_on_terminal,
    )?;
    Overrides {
        username: cli.username.clone(),
        dry_run: cli.dry_run,
    }
    .apply(&mut config);
    match source.path() {
        Some(path) => log.info(&format!("config: {}", path.display())),
        None => log.info("config: built-in defaults"),
    }
    attach_log_file(&config, log, sink);

    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
    let platform = Platform::detect(Path::new("/"), executor.as_ref())?;
    log.info(&format!("platform: {platform}"));

    let interrupted = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(&interrupted, log);

    let ctx = Context::new(
        Arc::new(config),
        Arc::new(platform),
        Arc::clone(log) as Arc<dyn Log>,
        executor,
        Arc::new(SystemAddressSource),
    )
    .with_interrupt(interrupted);

    if uid == 0
        && !ctx.dry_run
        && let Err(e) = example::install(&ctx.steward())
    {
        log.warn(&format!("could not install example configuration: {e:#}"));
    }

    let all = tasks::all_tasks();
    let outcome = execute_plan(&all, selection, &ctx);
    log.print_summary();
    outcome?;

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} action(s) failed");
    }
    Ok(())
}

/// Refuse to mutate the host without root; a dry run only warns.
///
/// # Errors
///
/// Returns [`HardnError::NotRoot`] when `uid` is not 0 outside dry-run.
pub fn require_root(uid: u32, dry_run: bool, log: &dyn Log) -> Result<(), HardnError> {
    if uid == 0 {
        return Ok(());
    }
    if dry_run {
        log.warn("not running as root; previewing only");
        return Ok(());
    }
    Err(HardnError::NotRoot { uid })
}

fn attach_log_file(config: &Config, log: &Logger, sink: &LogSink) {
    match sink.attach(&config.log_file) {
        Ok(()) => log.set_log_path(&config.log_file),
        Err(e) if config.dry_run => log.debug(&format!("log file not attached: {e}")),
        Err(e) => log.warn(&format!("log file not attached: {e}")),
    }
}

fn install_interrupt_handler(flag: &Arc<AtomicBool>, log: &Arc<Logger>) {
    let flag = Arc::clone(flag);
    let handler_log = Arc::clone(log);
    if let Err(e) = ctrlc::set_handler(move || {
        if !flag.swap(true, Ordering::SeqCst) {
            handler_log.warn("interrupt received; finishing the current step");
        }
    }) {
        log.warn(&format!("interrupt handler not installed: {e}"));
    }
}

/// Tasks to execute for `selection`, in fixed order.
///
/// A full run keeps every task; sub-action mode keeps exactly the selected
/// actions.
pub fn plan<'t>(tasks: &'t [Box<dyn Task>], selection: &Selection) -> Vec<&'t dyn Task> {
    tasks
        .iter()
        .filter(|task| match selection {
            Selection::RunAll => true,
            Selection::Only(actions) => actions.contains(&task.action()),
        })
        .map(AsRef::as_ref)
        .collect()
}

/// Plan and execute `selection` over `ctx`.
///
/// A full run honors each task's configuration gate; an explicit selection
/// runs regardless of it.
///
/// # Errors
///
/// Returns the halting condition (interrupt or halting error), if any.
pub fn execute_plan(tasks: &[Box<dyn Task>], selection: &Selection, ctx: &Context) -> Result<()> {
    let gates = match selection {
        Selection::RunAll => Gates::Honor,
        Selection::Only(_) => Gates::Ignore,
    };
    tasks::run_sequence(&plan(tasks, selection), gates, ctx)
}
