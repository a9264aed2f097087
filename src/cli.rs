use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::tasks::Action;

/// Top-level CLI entry point for the hardening engine.
#[derive(Parser, Debug)]
#[command(
    name = "hardn",
    about = "Linux hardening for Debian, Ubuntu, Proxmox and Alpine",
    disable_version_flag = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file (overrides HARDN_CONFIG and the standard locations)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Administrative user to create (overrides `username`)
    #[arg(short, long, value_name = "NAME")]
    pub username: Option<String>,

    #[command(flatten)]
    pub actions: ActionFlags,

    /// Preview changes without applying
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Print the log file and exit
    #[arg(long)]
    pub print_logs: bool,

    /// Print version, build date and commit
    #[arg(short = 'V', long)]
    pub version: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub silent: bool,
}

/// Action selection flags.
#[derive(Args, Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ActionFlags {
    /// Create the administrative user
    #[arg(long)]
    pub create_user: bool,

    /// Revoke root SSH login
    #[arg(long)]
    pub disable_root: bool,

    /// Install the Linux package sets
    #[arg(long)]
    pub install_linux: bool,

    /// Install Python system and pip packages
    #[arg(long)]
    pub install_python: bool,

    /// Install Linux and Python packages
    #[arg(long)]
    pub install_all: bool,

    /// Configure DNS resolvers
    #[arg(long)]
    pub configure_dns: bool,

    /// Configure the UFW firewall
    #[arg(long)]
    pub configure_ufw: bool,

    /// Configure package sources
    #[arg(long)]
    pub configure_sources: bool,

    /// Run every enabled hardening step
    #[arg(long)]
    pub run_all: bool,
}

/// Which tasks a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every task enabled by the configuration.
    RunAll,
    /// Exactly these actions, in fixed order.
    Only(BTreeSet<Action>),
}

impl ActionFlags {
    /// The selection these flags describe; `None` when no action was given.
    #[must_use]
    pub fn selection(&self) -> Option<Selection> {
        if self.run_all {
            return Some(Selection::RunAll);
        }
        let mut actions = BTreeSet::new();
        let flags = [
            (self.configure_sources, Action::ConfigureSources),
            (self.install_linux || self.install_all, Action::InstallLinux),
            (self.install_python || self.install_all, Action::InstallPython),
            (self.create_user, Action::CreateUser),
            (self.disable_root, Action::DisableRoot),
            (self.configure_ufw, Action::ConfigureUfw),
            (self.configure_dns, Action::ConfigureDns),
        ];
        for (set, action) in flags {
            if set {
                actions.insert(action);
            }
        }
        (!actions.is_empty()).then_some(Selection::Only(actions))
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Let the invoking sudo user keep HARDN_CONFIG across sudo
    SetupSudoEnv,
}
