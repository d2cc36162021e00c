//! Rule constraint functions for firewall rules
//!
//! This module centralizes small facts about valid field combinations that
//! are shared by the rule model, the rule factory and the formatter.
//!
//! # Examples
//!
//! ```
//! use melt::core::firewall::{AddressFamily, Protocol};
//! use melt::core::rule_constraints::*;
//!
//! assert!(protocol_supports_ports(Protocol::Tcp));
//! assert!(!protocol_supports_ports(Protocol::Icmp));
//!
//! let host = "2001:db8::1".parse().unwrap();
//! assert_eq!(family_of(&host), AddressFamily::Inet6);
//! ```

use super::firewall::{AddressFamily, Protocol};
use ipnetwork::IpNetwork;

// ═══════════════════════════════════════════════════════════════════════════
// Address Family Constraints
// ═══════════════════════════════════════════════════════════════════════════

/// Returns the address family of a host or network.
#[inline]
pub fn family_of(host: &IpNetwork) -> AddressFamily {
    match host {
        IpNetwork::V4(_) => AddressFamily::Inet,
        IpNetwork::V6(_) => AddressFamily::Inet6,
    }
}

/// Returns `true` if a rule of family `af` survives the build scope `scope`.
///
/// Rules without a family apply to both families and are always kept.
///
/// # Examples
///
/// ```
/// use melt::core::firewall::AddressFamily;
/// use melt::core::rule_constraints::family_in_scope;
///
/// assert!(family_in_scope(None, Some(AddressFamily::Inet)));
/// assert!(family_in_scope(Some(AddressFamily::Inet), None));
/// assert!(!family_in_scope(Some(AddressFamily::Inet6), Some(AddressFamily::Inet)));
/// ```
#[inline]
pub fn family_in_scope(af: Option<AddressFamily>, scope: Option<AddressFamily>) -> bool {
    match (af, scope) {
        (Some(af), Some(scope)) => af == scope,
        _ => true,
    }
}

/// Returns `true` if the host denotes the local loopback address.
///
/// Redirections to loopback are rendered without a destination host.
#[inline]
pub fn is_loopback(host: &IpNetwork) -> bool {
    host.ip().is_loopback()
}

/// Returns `true` if the network is a single host (`/32` or `/128`).
#[inline]
pub fn is_single_host(host: &IpNetwork) -> bool {
    match host {
        IpNetwork::V4(net) => net.prefix() == 32,
        IpNetwork::V6(net) => net.prefix() == 128,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Constraints
// ═══════════════════════════════════════════════════════════════════════════

/// Returns `true` if the protocol supports port matching.
///
/// A rule without a protocol may still carry ports; the backend decides
/// whether that is acceptable.
#[inline]
pub fn protocol_supports_ports(protocol: Protocol) -> bool {
    matches!(protocol, Protocol::Tcp | Protocol::Udp | Protocol::Sctp)
}

/// Returns the address family a protocol is bound to, if any.
#[inline]
pub fn protocol_family(protocol: Protocol) -> Option<AddressFamily> {
    match protocol {
        Protocol::Icmp => Some(AddressFamily::Inet),
        Protocol::Ipv6Icmp => Some(AddressFamily::Inet6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_host_detection() {
        assert!(is_single_host(&"192.168.0.42".parse().unwrap()));
        assert!(is_single_host(&"2001:db8::1".parse().unwrap()));
        assert!(!is_single_host(&"127.0.0.0/8".parse().unwrap()));
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback(&"127.0.0.1/32".parse().unwrap()));
        assert!(is_loopback(&"::1".parse().unwrap()));
        assert!(!is_loopback(&"192.168.0.42".parse().unwrap()));
    }

    #[test]
    fn test_icmp_families() {
        assert_eq!(protocol_family(Protocol::Icmp), Some(AddressFamily::Inet));
        assert_eq!(
            protocol_family(Protocol::Ipv6Icmp),
            Some(AddressFamily::Inet6)
        );
        assert_eq!(protocol_family(Protocol::Tcp), None);
    }
}
