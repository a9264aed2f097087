//! Host platform detection and capability binding.
use std::fmt;
use std::path::Path;

use crate::error::HardnError;
use crate::exec::Executor;
use crate::resources::package::{Apk, Apt, PackageTool};
use crate::resources::service::{OpenRc, ServiceSupervisor, Systemd};

/// Supported operating system families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Debian, Ubuntu and Proxmox VE.
    Debian,
    /// Alpine Linux.
    Alpine,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debian => write!(f, "debian"),
            Self::Alpine => write!(f, "alpine"),
        }
    }
}

/// Platform facts for the current host, produced once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// OS family used for dispatch.
    pub family: OsFamily,
    /// Raw `ID` from os-release (e.g. `ubuntu`).
    pub id: String,
    /// `VERSION_ID` from os-release (e.g. `12`, `3.19.1`).
    pub version: String,
    /// Release codename (e.g. `bookworm`); empty on Alpine.
    pub codename: String,
    /// Whether the host runs Proxmox VE.
    pub is_proxmox: bool,
}

/// Parse `KEY=value` lines of an os-release file, unquoting values.
fn os_release_value<'a>(contents: &'a str, key: &str) -> Option<&'a str> {
    contents.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k == key).then(|| v.trim().trim_matches('"').trim_matches('\''))
    })
}

impl Platform {
    /// Create a platform with explicit values.
    #[must_use]
    pub fn new(family: OsFamily, version: &str, codename: &str, is_proxmox: bool) -> Self {
        Self {
            family,
            id: family.to_string(),
            version: version.to_string(),
            codename: codename.to_string(),
            is_proxmox,
        }
    }

    /// Detect the platform of the host whose filesystem is mounted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::PlatformUnsupported`] if os-release is missing or
    /// names a family other than Debian-like or Alpine.
    pub fn detect(root: &Path, executor: &dyn Executor) -> Result<Self, HardnError> {
        let os_release = std::fs::read_to_string(root.join("etc/os-release")).map_err(|e| {
            HardnError::PlatformUnsupported(format!("cannot read /etc/os-release: {e}"))
        })?;
        let kernel = std::fs::read_to_string(root.join("proc/sys/kernel/osrelease"))
            .unwrap_or_default();
        let is_proxmox = kernel.contains("-pve")
            || root.join("etc/pve").exists()
            || executor.which("pveversion");
        Self::from_os_release(&os_release, is_proxmox)
    }

    /// Build platform facts from the contents of an os-release file.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::PlatformUnsupported`] for unknown families.
    pub fn from_os_release(contents: &str, is_proxmox: bool) -> Result<Self, HardnError> {
        let id = os_release_value(contents, "ID").unwrap_or_default().to_lowercase();
        let id_like = os_release_value(contents, "ID_LIKE")
            .unwrap_or_default()
            .to_lowercase();
        let ids: Vec<&str> = std::iter::once(id.as_str())
            .chain(id_like.split_whitespace())
            .collect();

        let family = if ids.iter().any(|i| *i == "debian" || *i == "ubuntu") {
            OsFamily::Debian
        } else if ids.contains(&"alpine") {
            OsFamily::Alpine
        } else {
            let name = if id.is_empty() { "unknown" } else { id.as_str() };
            return Err(HardnError::PlatformUnsupported(name.to_string()));
        };

        let version = os_release_value(contents, "VERSION_ID")
            .unwrap_or_default()
            .to_string();
        let codename = os_release_value(contents, "VERSION_CODENAME")
            .filter(|c| !c.is_empty())
            .or_else(|| os_release_value(contents, "UBUNTU_CODENAME").filter(|c| !c.is_empty()))
            .map(str::to_string)
            .or_else(|| {
                let version = os_release_value(contents, "VERSION")?;
                let (_, rest) = version.split_once('(')?;
                let (inner, _) = rest.split_once(')')?;
                inner.split_whitespace().next().map(str::to_lowercase)
            })
            .unwrap_or_default();

        Ok(Self {
            family,
            id,
            version,
            codename,
            is_proxmox,
        })
    }

    /// Whether this is a Debian-family host.
    #[must_use]
    pub fn is_debian(&self) -> bool {
        self.family == OsFamily::Debian
    }

    /// Whether this is an Alpine host.
    #[must_use]
    pub fn is_alpine(&self) -> bool {
        self.family == OsFamily::Alpine
    }

    /// `<major>.<minor>` of the version (Alpine repository branch).
    #[must_use]
    pub fn major_minor(&self) -> String {
        self.version.split('.').take(2).collect::<Vec<_>>().join(".")
    }

    /// Replace the literal `CODENAME` token; comment lines pass through.
    #[must_use]
    pub fn render_repo_line(&self, line: &str) -> String {
        if line.trim_start().starts_with('#') {
            line.to_string()
        } else {
            line.replace("CODENAME", &self.codename)
        }
    }

    /// Package tool bound to this family.
    #[must_use]
    pub fn package_tool(&self) -> Box<dyn PackageTool> {
        match self.family {
            OsFamily::Debian => Box::new(Apt {
                no_remove: self.is_proxmox,
            }),
            OsFamily::Alpine => Box::new(Apk),
        }
    }

    /// Service supervisor bound to this family.
    #[must_use]
    pub fn service_supervisor(&self) -> Box<dyn ServiceSupervisor> {
        match self.family {
            OsFamily::Debian => Box::new(Systemd),
            OsFamily::Alpine => Box::new(OpenRc),
        }
    }

    /// Administrative group granted sudo.
    #[must_use]
    pub const fn admin_group(&self) -> &'static str {
        match self.family {
            OsFamily::Debian => "sudo",
            OsFamily::Alpine => "wheel",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)?;
        if !self.codename.is_empty() {
            write!(f, " ({})", self.codename)?;
        }
        if self.is_proxmox {
            write!(f, " [proxmox]")?;
        }
        Ok(())
    }
}

/// Effective user id of this process.
#[must_use]
#[allow(unsafe_code)]
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid takes no arguments, has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}
