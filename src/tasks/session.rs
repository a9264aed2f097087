use anyhow::Result;

use super::{Action, Context, Task, TaskResult};

/// Print the run header and silence the login banner for the invoking
/// account.
#[derive(Debug)]
pub struct PrepareSession;

impl Task for PrepareSession {
    fn name(&self) -> &'static str {
        "Prepare session"
    }

    fn action(&self) -> Action {
        Action::Session
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        ctx.log.info(&header(ctx));
        let hushlogin = ctx.home.join(".hushlogin");
        ctx.steward().write_if_absent(&hushlogin, "", 0o644)?;
        Ok(TaskResult::done(ctx))
    }
}

fn header(ctx: &Context) -> String {
    let mode = if ctx.dry_run { " (dry run)" } else { "" };
    format!(
        "hardn {} on {}{mode}",
        crate::commands::version::VERSION,
        ctx.platform
    )
}
