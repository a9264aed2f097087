//! The single path through which managed files are written.
//!
//! Every write, backup and transform goes through [`FileSteward`] so dry-run
//! and backup policy are enforced in one place.  Absolute paths are resolved
//! under a root directory (`/` in production, a temp dir in tests).
use std::fs;
use std::io::Write as _;
use std::os::unix::fs::{DirBuilderExt as _, PermissionsExt as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use chrono::{Local, NaiveDateTime};

use super::{ResourceChange, ResourceState};
use crate::config::Config;
use crate::error::HardnError;
use crate::logging::Log;

/// Policy knobs for the steward.
#[derive(Debug, Clone)]
pub struct StewardOptions {
    /// Only log intended mutations.
    pub dry_run: bool,
    /// Back up files before replacing them.
    pub backups: bool,
    /// Root of the dated backup tree (host path, resolved under the root).
    pub backup_root: PathBuf,
}

impl Default for StewardOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backups: true,
            backup_root: PathBuf::from("/var/backups/hardn"),
        }
    }
}

impl StewardOptions {
    /// Options derived from the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: config.dry_run,
            backups: config.enable_backups,
            backup_root: config.backup_path.clone(),
        }
    }
}

/// Trace of one file change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Host path that was written.
    pub path: PathBuf,
    /// Host path of the backup taken first, if any.
    pub backup: Option<PathBuf>,
    /// Mode the file was left with.
    pub mode: u32,
}

/// Dry-run-aware writer with dated backups.
pub struct FileSteward<'a> {
    root: PathBuf,
    opts: StewardOptions,
    log: &'a dyn Log,
    journal: Mutex<Vec<MutationRecord>>,
}

impl std::fmt::Debug for FileSteward<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSteward")
            .field("root", &self.root)
            .field("opts", &self.opts)
            .field("log", &"<dyn Log>")
            .field("journal", &self.journal)
            .finish()
    }
}

fn mode_of(meta: &fs::Metadata) -> u32 {
    meta.permissions().mode() & 0o7777
}

impl<'a> FileSteward<'a> {
    /// Create a steward writing under `root`.
    #[must_use]
    pub fn new(root: &Path, opts: StewardOptions, log: &'a dyn Log) -> Self {
        Self {
            root: root.to_path_buf(),
            opts,
            log,
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Whether mutations are only previewed.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.opts.dry_run
    }

    /// Map a host path onto the steward's root.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path.strip_prefix("/").unwrap_or(path))
    }

    /// Every file change applied so far, in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<MutationRecord> {
        self.journal.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Whether `path` exists.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    /// Read `path` as text; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::FileIo`] for any other read failure.
    pub fn read(&self, path: &Path) -> Result<Option<String>, HardnError> {
        match fs::read_to_string(self.resolve(path)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HardnError::io("read", path, e)),
        }
    }

    /// Compare `path` against the desired contents and mode.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::FileIo`] if the file exists but cannot be read.
    pub fn state(&self, path: &Path, contents: &str, mode: u32) -> Result<ResourceState> {
        let target = self.resolve(path);
        let Some(current) = self.read(path)? else {
            return Ok(ResourceState::Missing);
        };
        if current != contents {
            return Ok(ResourceState::Incorrect {
                current: "contents differ".to_string(),
            });
        }
        let meta = fs::metadata(&target).map_err(|e| HardnError::io("stat", path, e))?;
        if mode_of(&meta) == mode {
            Ok(ResourceState::Correct)
        } else {
            Ok(ResourceState::Incorrect {
                current: format!("mode {:o}", mode_of(&meta)),
            })
        }
    }

    /// Write `contents` to `path` with `mode`, backing up what was there.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::FileIo`] on failure, or
    /// [`HardnError::VolumeUnwritable`] on a read-only filesystem.
    pub fn write(&self, path: &Path, contents: &str, mode: u32) -> Result<ResourceChange> {
        if self.state(path, contents, mode)? == ResourceState::Correct {
            self.log.debug(&format!("ok: {}", path.display()));
            return Ok(ResourceChange::AlreadyCorrect);
        }
        if self.opts.dry_run {
            self.log.dry_run(&format!(
                "would write {} ({} bytes, mode {mode:o})",
                path.display(),
                contents.len()
            ));
            return Ok(ResourceChange::Skipped {
                reason: "dry run".to_string(),
            });
        }

        let target = self.resolve(path);
        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        self.ensure_dir(&parent, 0o755)?;
        let backup = self.backup(path)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| HardnError::io("create temp file for", path, e))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| HardnError::io("write", path, e))?;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode))
            .map_err(|e| HardnError::io("chmod", path, e))?;
        tmp.persist(&target)
            .map_err(|e| HardnError::io("rename into", path, e.error))?;

        self.log.info(&format!("wrote {}", path.display()));
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(MutationRecord {
                path: path.to_path_buf(),
                backup,
                mode,
            });
        }
        Ok(ResourceChange::Applied)
    }

    /// Write `path` only if nothing exists there yet.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`FileSteward::write`].
    pub fn write_if_absent(&self, path: &Path, contents: &str, mode: u32) -> Result<ResourceChange> {
        if self.exists(path) {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        self.write(path, contents, mode)
    }

    /// Rewrite `path` with `f(current)`, preserving its mode.  An identical
    /// result leaves the file (and the backup tree) untouched.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::FileIo`] if the file is missing or unreadable,
    /// and the errors of [`FileSteward::write`].
    pub fn transform(&self, path: &Path, f: impl FnOnce(&str) -> String) -> Result<ResourceChange> {
        let target = self.resolve(path);
        let current = fs::read_to_string(&target).map_err(|e| HardnError::io("read", path, e))?;
        let updated = f(&current);
        if updated == current {
            self.log.debug(&format!("unchanged: {}", path.display()));
            return Ok(ResourceChange::AlreadyCorrect);
        }
        let mode = fs::metadata(&target)
            .map(|m| mode_of(&m))
            .map_err(|e| HardnError::io("stat", path, e))?;
        self.write(path, &updated, mode)
    }

    /// Create a directory (and parents) with `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::FileIo`] if the directory cannot be created.
    pub fn create_dir(&self, path: &Path, mode: u32) -> Result<ResourceChange> {
        let target = self.resolve(path);
        if let Ok(meta) = fs::metadata(&target)
            && meta.is_dir()
        {
            if mode_of(&meta) == mode {
                return Ok(ResourceChange::AlreadyCorrect);
            }
            if self.opts.dry_run {
                self.log
                    .dry_run(&format!("would chmod {mode:o} {}", path.display()));
                return Ok(ResourceChange::Skipped {
                    reason: "dry run".to_string(),
                });
            }
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                .map_err(|e| HardnError::io("chmod", path, e))?;
            return Ok(ResourceChange::Applied);
        }
        if self.opts.dry_run {
            self.log
                .dry_run(&format!("would create directory {} ({mode:o})", path.display()));
            return Ok(ResourceChange::Skipped {
                reason: "dry run".to_string(),
            });
        }
        self.ensure_dir(&target, mode)?;
        fs::set_permissions(&target, fs::Permissions::from_mode(mode))
            .map_err(|e| HardnError::io("chmod", path, e))?;
        Ok(ResourceChange::Applied)
    }

    /// Copy `path` into the dated backup tree.
    ///
    /// Returns the host path of the backup, or `None` when backups are
    /// disabled, in dry-run mode, or the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::FileIo`] if the copy fails.
    pub fn backup(&self, path: &Path) -> Result<Option<PathBuf>, HardnError> {
        self.backup_at(path, Local::now().naive_local())
    }

    fn backup_at(&self, path: &Path, now: NaiveDateTime) -> Result<Option<PathBuf>, HardnError> {
        if !self.opts.backups || self.opts.dry_run {
            return Ok(None);
        }
        let source = self.resolve(path);
        if !source.is_file() {
            return Ok(None);
        }
        let basename = path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().to_string());
        let host_dir = self
            .opts
            .backup_root
            .join(now.format("%Y-%m-%d").to_string());
        let dir = self.resolve(&host_dir);
        self.ensure_dir(&dir, 0o755)?;

        let stem = format!("{basename}.{}.bak", now.format("%H%M%S"));
        let mut name = stem.clone();
        let mut n = 0u32;
        while dir.join(&name).exists() {
            n += 1;
            name = format!("{stem}.{n}");
        }

        let dest = dir.join(&name);
        fs::copy(&source, &dest).map_err(|e| HardnError::io("backup", path, e))?;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o644))
            .map_err(|e| HardnError::io("chmod", &dest, e))?;
        let host_dest = host_dir.join(&name);
        self.log.debug(&format!(
            "backed up {} to {}",
            path.display(),
            host_dest.display()
        ));
        Ok(Some(host_dest))
    }

    /// Create `dir` (already resolved) and missing ancestors with `mode`.
    fn ensure_dir(&self, dir: &Path, mode: u32) -> Result<(), HardnError> {
        if dir.is_dir() {
            return Ok(());
        }
        fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(dir)
            .map_err(|e| {
                let host = dir.strip_prefix(&self.root).map_or_else(
                    |_| dir.to_path_buf(),
                    |p| Path::new("/").join(p),
                );
                HardnError::io("create directory", host, e)
            })
    }
}
