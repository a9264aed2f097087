// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed fake host: every absolute path the
// engine touches is resolved under a temp root, external commands go to a
// recording executor and interface addresses come from a fixed list.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hardn::config::Config;
use hardn::exec::{ExecResult, Executor};
use hardn::logging::{Log, MemoryLog};
use hardn::platform::{OsFamily, Platform};
use hardn::resources::network::AddressSource;
use hardn::tasks::Context;

/// Executor that records invocations and answers from prefix-matched
/// canned responses.  Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    calls: Mutex<Vec<String>>,
    responses: Vec<(String, ExecResult)>,
    programs: Vec<String>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` (first registration wins).
    pub fn respond(mut self, prefix: &str, result: ExecResult) -> Self {
        self.responses.push((prefix.to_string(), result));
        self
    }

    /// Report `program` as installed.
    pub fn with_program(mut self, program: &str) -> Self {
        self.programs.push(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

impl Executor for FakeExecutor {
    fn run_unchecked(
        &self,
        program: &str,
        args: &[&str],
        _env: &[(&str, &str)],
    ) -> anyhow::Result<ExecResult> {
        let rendered = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let result = self
            .responses
            .iter()
            .find(|(prefix, _)| rendered.starts_with(prefix.as_str()))
            .map_or_else(|| ExecResult::ok(""), |(_, r)| r.clone());
        self.calls.lock().expect("calls lock").push(rendered);
        Ok(result)
    }

    fn which(&self, program: &str) -> bool {
        self.programs.iter().any(|p| p == program)
    }
}

/// Fixed interface address list.
#[derive(Debug, Clone)]
pub struct StaticAddresses(pub Vec<Ipv4Addr>);

impl AddressSource for StaticAddresses {
    fn ipv4_addresses(&self) -> anyhow::Result<Vec<Ipv4Addr>> {
        Ok(self.0.clone())
    }
}

/// An isolated fake host backed by a [`tempfile::TempDir`].
pub struct FakeHost {
    pub root: tempfile::TempDir,
    pub config: Config,
    pub platform: Platform,
    pub exec: Arc<FakeExecutor>,
    pub log: Arc<MemoryLog>,
}

impl FakeHost {
    pub fn debian() -> Self {
        Self::with_platform(Platform::new(OsFamily::Debian, "12", "bookworm", false))
    }

    pub fn alpine() -> Self {
        Self::with_platform(Platform::new(OsFamily::Alpine, "3.19.1", "", false))
    }

    fn with_platform(platform: Platform) -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
            config: Config::default(),
            platform,
            exec: Arc::new(FakeExecutor::new()),
            log: Arc::new(MemoryLog::new()),
        }
    }

    pub fn configure(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn executor(mut self, exec: FakeExecutor) -> Self {
        self.exec = Arc::new(exec);
        self
    }

    pub fn context(&self) -> Context {
        Context::new(
            Arc::new(self.config.clone()),
            Arc::new(self.platform.clone()),
            Arc::clone(&self.log) as Arc<dyn Log>,
            Arc::clone(&self.exec) as Arc<dyn Executor>,
            Arc::new(StaticAddresses(vec![Ipv4Addr::LOCALHOST])),
        )
        .with_root(self.root.path().to_path_buf())
        .with_home(PathBuf::from("/root"))
    }

    pub fn path(&self, host: &str) -> PathBuf {
        self.root.path().join(host.trim_start_matches('/'))
    }

    pub fn write(&self, host: &str, contents: &str) {
        let path = self.path(host);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        std::fs::write(path, contents).expect("write host file");
    }

    pub fn read(&self, host: &str) -> String {
        std::fs::read_to_string(self.path(host)).expect("read host file")
    }

    pub fn exists(&self, host: &str) -> bool {
        self.path(host).exists()
    }

    /// Every regular file below the temp root, relative to it.
    pub fn files(&self) -> Vec<PathBuf> {
        fn walk(base: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).expect("read dir").flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(base, &path, out);
                } else {
                    out.push(path.strip_prefix(base).expect("under root").to_path_buf());
                }
            }
        }
        let mut out = Vec::new();
        walk(self.root.path(), self.root.path(), &mut out);
        out.sort();
        out
    }

    /// Backup files for today, relative to the temp root.
    pub fn backups(&self) -> Vec<PathBuf> {
        self.files()
            .into_iter()
            .filter(|p| p.starts_with("var/backups/hardn"))
            .collect()
    }
}
