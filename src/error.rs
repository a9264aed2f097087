//! Domain-specific error types for the hardening engine.
//!
//! Internal modules wrap these variants in [`anyhow::Error`] via `?`, and the
//! orchestrator downcasts them again to decide whether a failure halts the
//! run or only the action that raised it.
//!
//! # Disposition
//!
//! ```text
//! PlatformUnsupported, NotRoot, ConfigMissing,
//! ConfigParse, ConfigInvalid                  fatal at entry
//! VolumeUnwritable                            halts the run
//! FileIo, CommandFailed, NoNameservers,
//! SudoersInvalid, SshConfigMissing            fatal for the action
//! PackageInstallPartial                       non-fatal, logged per package
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Every failure kind the engine can raise.
#[derive(Error, Debug)]
pub enum HardnError {
    /// `/etc/os-release` names a family that is neither Debian-like nor Alpine.
    #[error("unsupported platform: {0}")]
    PlatformUnsupported(String),

    /// The effective UID is not 0.
    #[error("hardn must be run as root (effective uid {uid})")]
    NotRoot {
        /// Effective UID of the current process.
        uid: u32,
    },

    /// An explicit or environment-supplied configuration path does not exist.
    #[error("configuration file not found: {}", path.display())]
    ConfigMissing {
        /// Path that was requested.
        path: PathBuf,
    },

    /// The configuration file is not valid YAML for the configuration record.
    #[error("failed to parse configuration {}: {source}", path.display())]
    ConfigParse {
        /// Path of the file being parsed.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// The configuration parsed but violates an invariant.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A read, write or backup failed.
    #[error("{op} {}: {source}", path.display())]
    FileIo {
        /// What was being attempted (e.g. `"write"`, `"backup"`).
        op: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The volume holding a managed path is mounted read-only.
    #[error("volume holding {} is not writable: {source}", path.display())]
    VolumeUnwritable {
        /// Path whose write was refused.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool exited non-zero.
    #[error("command '{program} {}' failed (exit {}): {}", args.join(" "), code.map_or_else(|| "signal".to_string(), |c| c.to_string()), output.trim())]
    CommandFailed {
        /// Program that was invoked.
        program: String,
        /// Arguments passed to the program.
        args: Vec<String>,
        /// Combined stdout and stderr.
        output: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
    },

    /// DNS configuration was requested with an empty nameserver list.
    #[error("no nameservers configured")]
    NoNameservers,

    /// `visudo -c` rejected a candidate sudoers drop-in.
    #[error("sudoers drop-in for {} failed validation: {output}", target.display())]
    SudoersInvalid {
        /// Drop-in that was being installed.
        target: PathBuf,
        /// Output of `visudo`.
        output: String,
    },

    /// Some packages of a batch failed to install.
    #[error("{} package(s) failed to install: {}", failed.len(), failed.join(", "))]
    PackageInstallPartial {
        /// Names of the packages that failed.
        failed: Vec<String>,
    },

    /// Root revocation found no active sshd configuration.
    #[error("sshd configuration not found: {}", path.display())]
    SshConfigMissing {
        /// Path that was expected to exist.
        path: PathBuf,
    },
}

impl HardnError {
    /// Whether this failure must stop the whole run rather than only the
    /// action that raised it.
    #[must_use]
    pub const fn halts_run(&self) -> bool {
        matches!(
            self,
            Self::PlatformUnsupported(_)
                | Self::NotRoot { .. }
                | Self::ConfigMissing { .. }
                | Self::ConfigParse { .. }
                | Self::ConfigInvalid(_)
                | Self::VolumeUnwritable { .. }
        )
    }

    /// Build a [`HardnError::FileIo`] or, for a read-only filesystem,
    /// a [`HardnError::VolumeUnwritable`].
    #[must_use]
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::ReadOnlyFilesystem {
            Self::VolumeUnwritable { path, source }
        } else {
            Self::FileIo { op, path, source }
        }
    }
}

/// Return `true` if `err` (or anything in its cause chain) is a run-halting
/// [`HardnError`].
#[must_use]
pub fn halts_run(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<HardnError>())
        .any(HardnError::halts_run)
}
