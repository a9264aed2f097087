use std::path::Path;

use anyhow::{Context as _, Result};

use super::{Action, Context, Task, TaskResult};
use crate::platform::Platform;
use crate::resources::ResourceChange;

const APT_SOURCES: &str = "/etc/apt/sources.list";
const PVE_INSTALL_LIST: &str = "/etc/apt/sources.list.d/pve-install-repo.list";
const CEPH_LIST: &str = "/etc/apt/sources.list.d/ceph.list";
const PVE_ENTERPRISE_LIST: &str = "/etc/apt/sources.list.d/pve-enterprise.list";
const APK_REPOSITORIES: &str = "/etc/apk/repositories";

/// Rewrite the package repository lists and refresh the index.
#[derive(Debug)]
pub struct ConfigureSources;

impl Task for ConfigureSources {
    fn name(&self) -> &'static str {
        "Configure package sources"
    }

    fn action(&self) -> Action {
        Action::ConfigureSources
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let steward = ctx.steward();
        let mut changes: Vec<ResourceChange> = Vec::new();

        for (path, contents) in source_files(ctx) {
            let change = steward
                .write(Path::new(path), &contents, 0o644)
                .with_context(|| format!("writing {path}"))?;
            changes.push(change);
        }

        let changed = changes.iter().filter(|c| c.is_applied()).count();
        if changed > 0 {
            ctx.log.info(&format!("{changed} source list(s) updated"));
        }

        ctx.package_tool()
            .update_index(&ctx.runner(), &ctx.config.locale_env())
            .context("refreshing package index")?;
        Ok(TaskResult::done(ctx))
    }
}

/// Every repository file this host should carry, with rendered contents.
fn source_files(ctx: &Context) -> Vec<(&'static str, String)> {
    let platform = &ctx.platform;
    let config = &ctx.config;
    if platform.is_alpine() {
        return vec![(
            APK_REPOSITORIES,
            alpine_repositories(platform, &config.alpine_mirror, config.alpine_testing_repo),
        )];
    }

    let mut files = vec![(APT_SOURCES, render_lines(platform, &config.debian_repos))];
    if platform.is_proxmox {
        files.push((
            PVE_INSTALL_LIST,
            render_lines(platform, &config.proxmox_src_repos),
        ));
        files.push((CEPH_LIST, render_lines(platform, &config.proxmox_ceph_repos)));
        files.push((
            PVE_ENTERPRISE_LIST,
            render_lines(platform, &config.proxmox_enterprise_repos),
        ));
    }
    files
}

/// Render repository lines, substituting the codename.
#[must_use]
pub fn render_lines(platform: &Platform, lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&platform.render_repo_line(line));
        out.push('\n');
    }
    out
}

/// `/etc/apk/repositories` for the running release branch.
#[must_use]
pub fn alpine_repositories(platform: &Platform, mirror: &str, testing: bool) -> String {
    let mirror = mirror.trim_end_matches('/');
    let branch = format!("v{}", platform.major_minor());
    let mut out = format!("{mirror}/{branch}/main\n{mirror}/{branch}/community\n");
    if testing {
        out.push_str(&format!("@testing {mirror}/edge/testing\n"));
    }
    out
}
