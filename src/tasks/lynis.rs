use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult};
use crate::logging::utils::strip_ansi;
use crate::resources::package::install_batch;

/// Install Lynis and run a quick system audit.
#[derive(Debug)]
pub struct RunLynisAudit;

impl Task for RunLynisAudit {
    fn name(&self) -> &'static str {
        "Run Lynis audit"
    }

    fn action(&self) -> Action {
        Action::Lynis
    }

    fn enabled(&self, ctx: &Context) -> Result<(), String> {
        if ctx.config.enable_lynis {
            Ok(())
        } else {
            Err("enable_lynis is false".to_string())
        }
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let runner = ctx.runner();
        install_batch(
            ctx.package_tool().as_ref(),
            &runner,
            ctx.log.as_ref(),
            &["lynis".to_string()],
            &[],
            &ctx.config.locale_env(),
        )
        .into_result()?;

        let result = runner
            .run("lynis", &["audit", "system", "--quick"])
            .context("running lynis audit")?;
        if ctx.dry_run {
            return Ok(TaskResult::DryRun);
        }
        match hardening_index(&result.stdout) {
            Some(index) => ctx.log.info(&format!("Lynis hardening index: {index}")),
            None => ctx.log.warn("Lynis output did not include a hardening index"),
        }
        Ok(TaskResult::Ok)
    }
}

/// Extract the score from Lynis' `Hardening index : 67 [#####   ]` line.
#[must_use]
pub fn hardening_index(output: &str) -> Option<u32> {
    let clean = strip_ansi(output);
    let line = clean.lines().find(|l| l.contains("Hardening index"))?;
    let (_, value) = line.split_once(':')?;
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
