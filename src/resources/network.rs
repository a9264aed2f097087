//! Network facts: interface addresses and the DMZ subnet check.
use std::net::Ipv4Addr;

use anyhow::{Context as _, Result};
#[cfg(test)]
use mockall::automock;
use network_interface::{NetworkInterface, NetworkInterfaceConfig as _};

/// Source of the host's IPv4 addresses.
#[cfg_attr(test, automock)]
pub trait AddressSource: Send + Sync {
    /// All IPv4 addresses bound to any interface, loopback included.
    ///
    /// # Errors
    ///
    /// Returns an error if the interface list cannot be read.
    fn ipv4_addresses(&self) -> Result<Vec<Ipv4Addr>>;
}

/// Source backed by the kernel's interface list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAddressSource;

impl AddressSource for SystemAddressSource {
    fn ipv4_addresses(&self) -> Result<Vec<Ipv4Addr>> {
        let interfaces = NetworkInterface::show().context("Failed to get network interfaces")?;
        Ok(interfaces
            .into_iter()
            .flat_map(|iface| iface.addr)
            .filter_map(|addr| match addr.ip() {
                std::net::IpAddr::V4(v4) => Some(v4),
                std::net::IpAddr::V6(_) => None,
            })
            .collect())
    }
}

/// Whether any non-loopback IPv4 address starts with `<prefix>.`.
///
/// # Errors
///
/// Returns an error if the address lookup fails.
pub fn in_subnet(source: &dyn AddressSource, prefix: &str) -> Result<bool> {
    let needle = format!("{}.", prefix.trim_end_matches('.'));
    Ok(source
        .ipv4_addresses()?
        .iter()
        .filter(|ip| !ip.is_loopback())
        .any(|ip| ip.to_string().starts_with(&needle)))
}
