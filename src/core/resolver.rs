//! Host name resolution
//!
//! The rule factory turns every host string of an intent into one or more
//! addresses through an [`AddressResolver`]. A name with several records
//! yields several alternatives, each expanded into its own rule.
//!
//! - [`StaticResolver`]: fixed name table, used by tests and offline builds
//! - [`SystemResolver`]: literal addresses, configured host overrides, then
//!   the platform resolver (`getaddrinfo`)

use crate::core::error::{Error, Result};
use ipnetwork::IpNetwork;
use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};
use tracing::trace;

/// Resolves a host name or literal address into tagged addresses.
pub trait AddressResolver {
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] if the name has no address.
    fn resolve(&self, name: &str) -> Result<Vec<IpNetwork>>;
}

impl<R: AddressResolver + ?Sized> AddressResolver for &R {
    fn resolve(&self, name: &str) -> Result<Vec<IpNetwork>> {
        (**self).resolve(name)
    }
}

/// Parses an address or CIDR literal (`192.168.0.0/24`, `2001:db8::1`).
fn parse_literal(name: &str) -> Option<IpNetwork> {
    name.parse().ok()
}

/// Resolver backed by a fixed table of names.
///
/// Literal addresses resolve to themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpNetwork>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the addresses of `name`.
    pub fn insert(&mut self, name: impl Into<String>, addresses: Vec<IpNetwork>) {
        self.hosts.insert(name.into(), addresses);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_host(mut self, name: impl Into<String>, addresses: Vec<IpNetwork>) -> Self {
        self.insert(name, addresses);
        self
    }
}

impl From<HashMap<String, Vec<IpNetwork>>> for StaticResolver {
    fn from(hosts: HashMap<String, Vec<IpNetwork>>) -> Self {
        Self { hosts }
    }
}

impl AddressResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Result<Vec<IpNetwork>> {
        if let Some(literal) = parse_literal(name) {
            return Ok(vec![literal]);
        }
        match self.hosts.get(name) {
            Some(addresses) if !addresses.is_empty() => Ok(addresses.clone()),
            _ => Err(Error::resolution(name, "unknown host")),
        }
    }
}

/// Resolver using static overrides first, then the platform resolver.
#[derive(Debug, Clone, Default)]
pub struct SystemResolver {
    overrides: StaticResolver,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: StaticResolver) -> Self {
        Self { overrides }
    }
}

impl AddressResolver for SystemResolver {
    fn resolve(&self, name: &str) -> Result<Vec<IpNetwork>> {
        if let Ok(addresses) = self.overrides.resolve(name) {
            return Ok(addresses);
        }

        trace!("Resolving {name} through the system resolver");
        let addrs = (name, 0)
            .to_socket_addrs()
            .map_err(|e| Error::resolution(name, e))?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        if ips.is_empty() {
            return Err(Error::resolution(name, "no address records"));
        }
        trace!("{name} resolved to {ips:?}");
        Ok(ips.into_iter().map(IpNetwork::from).collect())
    }
}
