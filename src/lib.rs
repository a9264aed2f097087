//! Single-host Linux hardening engine.
//!
//! Converges a Debian, Ubuntu, Proxmox or Alpine host to a baseline secure
//! state: an administrative account, restricted SSH, a default-deny
//! firewall, DNS, curated package sets and optional security add-ons, all
//! driven by one YAML configuration file.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]**: load, validate and locate the YAML configuration
//! - **[`resources`]**: file steward, package tools, service supervisors
//! - **[`tasks`]**: named, ordered hardening steps wired to resources
//! - **[`commands`]**: top-level command orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod resources;
pub mod tasks;
