//! Locating the configuration file.
//!
//! Precedence, first match wins: explicit `--config` path, `HARDN_CONFIG`,
//! `/etc/hardn/hardn.yml`, `$HOME/.config/hardn/hardn.yml`,
//! `$HOME/.hardn.yml`, `./hardn.yml`.  An explicit or environment path that
//! does not exist is an error; it never falls through to the next source.
use std::fs;
use std::io::{BufRead as _, IsTerminal as _, Write as _};
use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};

use super::Config;
use super::example::EXAMPLE_CONFIG;
use crate::error::HardnError;

/// File name searched for in every location.
pub const FILE_NAME: &str = "hardn.yml";

/// Process facts the resolver depends on, captured once so tests can
/// supply their own.
#[derive(Debug, Clone)]
pub struct ResolveEnv {
    /// Value of `HARDN_CONFIG`, if set and non-empty.
    pub hardn_config: Option<PathBuf>,
    /// Home directory of the invoking account.
    pub home: Option<PathBuf>,
    /// Current working directory.
    pub cwd: PathBuf,
    /// System-wide configuration directory (`/etc/hardn`).
    pub system_dir: PathBuf,
    /// Whether the process runs with effective uid 0.
    pub is_root: bool,
    /// Whether stdin is a terminal.
    pub interactive: bool,
}

impl ResolveEnv {
    /// Capture the current process environment.
    #[must_use]
    pub fn from_process(is_root: bool) -> Self {
        Self {
            hardn_config: std::env::var_os("HARDN_CONFIG")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            home: dirs::home_dir(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            system_dir: PathBuf::from("/etc/hardn"),
            is_root,
            interactive: std::io::stdin().is_terminal(),
        }
    }

    /// Discovery locations after the explicit and environment paths.
    #[must_use]
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.system_dir.join(FILE_NAME)];
        if let Some(home) = &self.home {
            paths.push(home.join(".config/hardn").join(FILE_NAME));
            paths.push(home.join(".hardn.yml"));
        }
        paths.push(self.cwd.join(FILE_NAME));
        paths
    }

    /// Where a new default file is created: system-wide for root, per-user
    /// otherwise.
    #[must_use]
    pub fn default_target(&self) -> PathBuf {
        match (&self.home, self.is_root) {
            (Some(home), false) => home.join(".config/hardn").join(FILE_NAME),
            _ => self.system_dir.join(FILE_NAME),
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config <path>`.
    Explicit(PathBuf),
    /// `HARDN_CONFIG`.
    Environment(PathBuf),
    /// One of the standard locations.
    Discovered(PathBuf),
    /// Newly created from the bundled example.
    Created(PathBuf),
    /// No file; built-in defaults.
    Defaults,
}

impl ConfigSource {
    /// The file backing the configuration, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Environment(p) | Self::Discovered(p) | Self::Created(p) => {
                Some(p)
            }
            Self::Defaults => None,
        }
    }
}

/// Find the configuration file without reading it.
///
/// # Errors
///
/// Returns [`HardnError::ConfigMissing`] when the explicit or environment
/// path does not exist.
pub fn locate(explicit: Option<&Path>, env: &ResolveEnv) -> Result<Option<ConfigSource>, HardnError> {
    if let Some(path) = explicit {
        return existing(path).map(|p| Some(ConfigSource::Explicit(p)));
    }
    if let Some(path) = &env.hardn_config {
        return existing(path).map(|p| Some(ConfigSource::Environment(p)));
    }
    Ok(env
        .search_paths()
        .into_iter()
        .find(|p| p.is_file())
        .map(ConfigSource::Discovered))
}

fn existing(path: &Path) -> Result<PathBuf, HardnError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(HardnError::ConfigMissing {
            path: path.to_path_buf(),
        })
    }
}

/// Resolve and load the configuration.
///
/// When no file is found and the process is interactive (and not a dry
/// run), `confirm` is asked whether to create one from the bundled example.
///
/// # Errors
///
/// Returns the errors of [`locate`] and [`Config::load`], and
/// [`HardnError::FileIo`] if a new default file cannot be written.
pub fn resolve(
    explicit: Option<&Path>,
    env: &ResolveEnv,
    dry_run: bool,
    confirm: &mut dyn FnMut(&str) -> bool,
) -> Result<(Config, ConfigSource), HardnError> {
    if let Some(source) = locate(explicit, env)? {
        let config = match source.path() {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        return Ok((config, source));
    }

    if env.interactive && !dry_run {
        let target = env.default_target();
        let question = format!(
            "No configuration found. Create a default one at {}?",
            target.display()
        );
        if confirm(&question) {
            write_default(&target)?;
            let config = Config::load(&target)?;
            return Ok((config, ConfigSource::Created(target)));
        }
    }
    Ok((Config::default(), ConfigSource::Defaults))
}

fn write_default(target: &Path) -> Result<(), HardnError> {
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir).map_err(|e| HardnError::io("create directory", dir, e))?;
    }
    fs::write(target, EXAMPLE_CONFIG).map_err(|e| HardnError::io("write", target, e))?;
    fs::set_permissions(target, fs::Permissions::from_mode(0o644))
        .map_err(|e| HardnError::io("chmod", target, e))?;
    Ok(())
}

/// Ask a yes/no question on the terminal; anything but `y`/`yes` is no.
#[must_use]
pub fn ask_on_terminal(question: &str) -> bool {
    print!("{question} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--username`.
    pub username: Option<String>,
    /// `--dry-run`.
    pub dry_run: bool,
}

impl Overrides {
    /// Apply onto a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(user) = self.username.as_deref().filter(|u| !u.is_empty()) {
            config.username = user.to_string();
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}
