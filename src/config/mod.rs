//! Declarative hardening configuration.
//!
//! One [`Config`] record with every field defaulted; a YAML file supplies
//! only overrides.  [`resolve`] locates the file, [`example`] carries the
//! bundled annotated example.
pub mod example;
pub mod resolve;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HardnError;

/// Default UFW policy values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallPolicy {
    /// Accept traffic.
    Allow,
    /// Silently drop traffic.
    Deny,
    /// Drop traffic and notify the sender.
    Reject,
}

impl fmt::Display for FirewallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Reject => "reject",
        })
    }
}

/// A named UFW application profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppProfile {
    /// Profile name, used with `ufw allow <name>`.
    pub name: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// `port/proto` entries (e.g. `30443/tcp`).
    #[serde(default)]
    pub ports: Vec<String>,
}

/// The complete hardening configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    // identity
    /// Administrative user to create.
    pub username: String,
    /// Authorized public keys, in order.
    pub ssh_keys: Vec<String>,
    /// Grant passwordless sudo.
    pub sudo_no_password: bool,

    // paths
    /// Append-only log file.
    pub log_file: PathBuf,
    /// Root of the dated backup tree.
    pub backup_path: PathBuf,
    /// sshd drop-in written on Debian-family hosts.
    pub ssh_config_file: PathBuf,

    // ssh
    /// Listening port.
    pub ssh_port: u16,
    /// Render `PermitRootLogin yes`.
    pub permit_root_login: bool,
    /// Users listed in `AllowUsers`.
    pub ssh_allowed_users: Vec<String>,
    /// `ListenAddress` value.
    pub ssh_listen_address: String,
    /// Additional authorized-keys directory; `%u` is expanded by sshd.
    pub ssh_key_path: String,

    // network
    /// Dotted /24 prefix of the DMZ subnet (e.g. `192.168.4`).
    pub dmz_subnet: String,
    /// Resolvers, primary first.
    pub nameservers: Vec<String>,

    // firewall
    /// Advisory default for incoming traffic.
    pub ufw_default_incoming_policy: FirewallPolicy,
    /// Advisory default for outgoing traffic.
    pub ufw_default_outgoing_policy: FirewallPolicy,
    /// Extra TCP ports to allow.
    pub ufw_allowed_ports: BTreeSet<u16>,
    /// Application profiles to render and enable.
    pub ufw_app_profiles: Vec<AppProfile>,

    // package sets
    /// Debian-family packages installed everywhere.
    pub linux_core_packages: Vec<String>,
    /// Debian-family packages for DMZ and lab hosts.
    pub linux_dmz_packages: Vec<String>,
    /// Debian-family packages for lab hosts only.
    pub linux_lab_packages: Vec<String>,
    /// Alpine packages installed everywhere.
    pub alpine_core_packages: Vec<String>,
    /// Alpine packages for DMZ and lab hosts.
    pub alpine_dmz_packages: Vec<String>,
    /// Alpine packages for lab hosts only.
    pub alpine_lab_packages: Vec<String>,
    /// Debian-family Python system packages.
    pub python_packages: Vec<String>,
    /// Alpine Python system packages.
    pub alpine_python_packages: Vec<String>,
    /// Packages installed with pip (or uv).
    pub pip_packages: Vec<String>,

    // repositories
    /// Lines of `/etc/apt/sources.list`.
    pub debian_repos: Vec<String>,
    /// Lines of `pve-install-repo.list`.
    pub proxmox_src_repos: Vec<String>,
    /// Lines of `ceph.list`.
    pub proxmox_ceph_repos: Vec<String>,
    /// Lines of `pve-enterprise.list`.
    pub proxmox_enterprise_repos: Vec<String>,
    /// Glob-style patterns of packages a batch must never touch on Proxmox.
    pub proxmox_package_patterns: Vec<String>,
    /// Alpine mirror base URL.
    pub alpine_mirror: String,

    // feature flags
    /// Back up files before changing them.
    pub enable_backups: bool,
    /// Install and enable AppArmor.
    pub enable_app_armor: bool,
    /// Install Lynis and run an audit.
    pub enable_lynis: bool,
    /// Configure unattended security upgrades.
    pub enable_unattended_upgrades: bool,
    /// Bring up the firewall with an SSH rule.
    pub enable_ufw_ssh_policy: bool,
    /// Configure DNS resolvers.
    pub configure_dns: bool,
    /// Revoke root SSH access.
    pub disable_root: bool,
    /// Preview mutations only.
    pub dry_run: bool,
    /// Install pip packages with `uv`.
    pub use_uv_package_manager: bool,
    /// Add the Alpine edge testing repository.
    pub alpine_testing_repo: bool,

    // locale
    /// `LANG` for package tools.
    pub lang: String,
    /// `LANGUAGE` for package tools.
    pub language: String,
    /// `LC_ALL` for package tools.
    pub lc_all: String,
    /// `TZ` for package tools.
    pub tz: String,
    /// `PYTHONUNBUFFERED` for package tools.
    pub python_unbuffered: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            ssh_keys: Vec::new(),
            sudo_no_password: false,
            log_file: PathBuf::from("/var/log/hardn.log"),
            backup_path: PathBuf::from("/var/backups/hardn"),
            ssh_config_file: PathBuf::from("/etc/ssh/sshd_config.d/hardn.conf"),
            ssh_port: 22,
            permit_root_login: false,
            ssh_allowed_users: Vec::new(),
            ssh_listen_address: "0.0.0.0".to_string(),
            ssh_key_path: "/etc/ssh/authorized_keys/%u".to_string(),
            dmz_subnet: "192.168.4".to_string(),
            nameservers: strings(&["1.1.1.1", "1.0.0.1"]),
            ufw_default_incoming_policy: FirewallPolicy::Deny,
            ufw_default_outgoing_policy: FirewallPolicy::Allow,
            ufw_allowed_ports: BTreeSet::new(),
            ufw_app_profiles: Vec::new(),
            linux_core_packages: strings(&[
                "ufw",
                "fail2ban",
                "curl",
                "ca-certificates",
                "gnupg",
                "sudo",
            ]),
            linux_dmz_packages: strings(&["needrestart", "debsums"]),
            linux_lab_packages: strings(&["git", "htop", "tmux", "build-essential"]),
            alpine_core_packages: strings(&["ufw", "openssh", "curl", "sudo", "shadow"]),
            alpine_dmz_packages: strings(&["fail2ban"]),
            alpine_lab_packages: strings(&["git", "htop", "tmux", "build-base"]),
            python_packages: strings(&["python3", "python3-pip", "python3-venv"]),
            alpine_python_packages: strings(&["python3", "py3-pip"]),
            pip_packages: Vec::new(),
            debian_repos: strings(&[
                "deb http://deb.debian.org/debian CODENAME main contrib non-free-firmware",
                "deb http://deb.debian.org/debian CODENAME-updates main contrib non-free-firmware",
                "deb http://security.debian.org/debian-security CODENAME-security main contrib non-free-firmware",
            ]),
            proxmox_src_repos: strings(&[
                "deb http://download.proxmox.com/debian/pve CODENAME pve-no-subscription",
            ]),
            proxmox_ceph_repos: strings(&[
                "# deb https://enterprise.proxmox.com/debian/ceph-quincy CODENAME enterprise",
                "deb http://download.proxmox.com/debian/ceph-quincy CODENAME no-subscription",
            ]),
            proxmox_enterprise_repos: strings(&[
                "# deb https://enterprise.proxmox.com/debian/pve CODENAME pve-enterprise",
            ]),
            proxmox_package_patterns: strings(&["proxmox-*", "pve-*", "ceph*", "qemu-server"]),
            alpine_mirror: "https://dl-cdn.alpinelinux.org/alpine".to_string(),
            enable_backups: true,
            enable_app_armor: false,
            enable_lynis: false,
            enable_unattended_upgrades: false,
            enable_ufw_ssh_policy: true,
            configure_dns: true,
            disable_root: true,
            dry_run: false,
            use_uv_package_manager: false,
            alpine_testing_repo: false,
            lang: "en_US.UTF-8".to_string(),
            language: "en_US:en".to_string(),
            lc_all: "en_US.UTF-8".to_string(),
            tz: "UTC".to_string(),
            python_unbuffered: "1".to_string(),
        }
    }
}

impl Config {
    /// Parse YAML text; missing keys take their defaults, unknown keys are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::ConfigParse`] for malformed YAML and
    /// [`HardnError::ConfigInvalid`] when validation fails.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, HardnError> {
        // An empty file deserializes as unit, not as a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text).map_err(|source| HardnError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::ConfigMissing`] if the file does not exist,
    /// [`HardnError::FileIo`] if it cannot be read, and the errors of
    /// [`Config::from_yaml`].
    pub fn load(path: &Path) -> Result<Self, HardnError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HardnError::ConfigMissing {
                    path: path.to_path_buf(),
                }
            } else {
                HardnError::io("read", path, e)
            }
        })?;
        Self::from_yaml(&text, path)
    }

    /// Check invariants the type system does not enforce.
    ///
    /// # Errors
    ///
    /// Returns [`HardnError::ConfigInvalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), HardnError> {
        if self.ssh_port == 0 {
            return Err(HardnError::ConfigInvalid(
                "ssh_port must be between 1 and 65535".to_string(),
            ));
        }
        if self.ufw_allowed_ports.contains(&0) {
            return Err(HardnError::ConfigInvalid(
                "ufw_allowed_ports may not contain 0".to_string(),
            ));
        }
        for profile in &self.ufw_app_profiles {
            if profile.name.trim().is_empty() {
                return Err(HardnError::ConfigInvalid(
                    "ufw_app_profiles entry without a name".to_string(),
                ));
            }
            if profile.ports.is_empty() {
                return Err(HardnError::ConfigInvalid(format!(
                    "ufw_app_profiles entry '{}' lists no ports",
                    profile.name
                )));
            }
        }
        Ok(())
    }

    /// Users rendered into `AllowUsers`; `root` is dropped unless root
    /// login is permitted.
    #[must_use]
    pub fn effective_allowed_users(&self) -> Vec<&str> {
        self.ssh_allowed_users
            .iter()
            .map(String::as_str)
            .filter(|u| self.permit_root_login || *u != "root")
            .collect()
    }

    /// Locale environment passed to package tools.
    #[must_use]
    pub fn locale_env(&self) -> Vec<(&'static str, &str)> {
        [
            ("LANG", self.lang.as_str()),
            ("LANGUAGE", self.language.as_str()),
            ("LC_ALL", self.lc_all.as_str()),
            ("TZ", self.tz.as_str()),
            ("PYTHONUNBUFFERED", self.python_unbuffered.as_str()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Config, HardnError> {
        Config::from_yaml(yaml, Path::new("/tmp/test.yml"))
    }

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(parse("").unwrap(), Config::default());
    }

    #[test]
    fn file_supplies_only_overrides() {
        let config = parse("username: sysadmin\nssh_port: 2208\n").unwrap();
        assert_eq!(config.username, "sysadmin");
        assert_eq!(config.ssh_port, 2208);
        assert_eq!(config.nameservers, vec!["1.1.1.1", "1.0.0.1"]);
        assert!(config.enable_backups);
        assert!(config.disable_root);
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let config = parse("username: a\nshow_banner: true\n").unwrap();
        assert_eq!(config.username, "a");
    }

    #[test]
    fn port_zero_is_invalid() {
        let err = parse("ssh_port: 0\n").unwrap_err();
        assert!(matches!(err, HardnError::ConfigInvalid(_)));
    }

    #[test]
    fn port_out_of_range_is_parse_error() {
        let err = parse("ssh_port: 70000\n").unwrap_err();
        assert!(matches!(err, HardnError::ConfigParse { .. }));
    }

    #[test]
    fn unknown_policy_is_parse_error() {
        let err = parse("ufw_default_incoming_policy: maybe\n").unwrap_err();
        assert!(matches!(err, HardnError::ConfigParse { .. }));
    }

    #[test]
    fn policies_parse_lowercase() {
        let config = parse("ufw_default_incoming_policy: reject\n").unwrap();
        assert_eq!(config.ufw_default_incoming_policy, FirewallPolicy::Reject);
    }

    #[test]
    fn profiles_parse() {
        let config = parse(
            "ufw_app_profiles:\n  - name: LabHTTPS\n    title: Lab HTTPS\n    description: tls\n    ports: [\"30443/tcp\"]\n",
        )
        .unwrap();
        assert_eq!(config.ufw_app_profiles.len(), 1);
        assert_eq!(config.ufw_app_profiles[0].ports, vec!["30443/tcp"]);
    }

    #[test]
    fn profile_without_ports_is_invalid() {
        let err = parse("ufw_app_profiles:\n  - name: Empty\n").unwrap_err();
        assert!(matches!(err, HardnError::ConfigInvalid(ref m) if m.contains("Empty")));
    }

    #[test]
    fn root_filtered_from_allowed_users() {
        let mut config = Config {
            ssh_allowed_users: vec!["root".into(), "ops".into()],
            ..Config::default()
        };
        assert_eq!(config.effective_allowed_users(), vec!["ops"]);
        config.permit_root_login = true;
        assert_eq!(config.effective_allowed_users(), vec!["root", "ops"]);
    }

    #[test]
    fn load_missing_file_is_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, HardnError::ConfigMissing { .. }));
    }

    #[test]
    fn bundled_example_parses() {
        let config = parse(example::EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.ssh_port, 22);
    }

    #[test]
    fn locale_env_skips_empty_values() {
        let config = Config {
            tz: String::new(),
            ..Config::default()
        };
        let env = config.locale_env();
        assert!(env.iter().all(|(k, _)| *k != "TZ"));
        assert!(env.contains(&("LANG", "en_US.UTF-8")));
    }
}
