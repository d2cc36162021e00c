//! Shared test utilities for core module tests
//!
//! Provides the fixed resolver and services table used across test suites.
//! This module is only compiled in test mode.

use crate::core::factory::RuleFactory;
use crate::core::firewall::{Rule, RuleSpec};
use crate::core::resolver::StaticResolver;
use crate::core::services::ServiceTable;
use ipnetwork::IpNetwork;

/// Parses an address or network literal.
pub fn net(s: &str) -> IpNetwork {
    s.parse().unwrap()
}

/// Builds a rule that is known to be valid.
pub fn rule(spec: RuleSpec) -> Rule {
    Rule::new(spec).unwrap()
}

/// Host table of the test network.
///
/// - `dualstack`: one IPv4 and one IPv6 record
/// - `www`, `ns1`, `ns2`: single IPv4 hosts
/// - `lan`: a /24 network
pub fn test_resolver() -> StaticResolver {
    StaticResolver::new()
        .with_host("dualstack", vec![net("192.0.2.10"), net("2001:db8::10")])
        .with_host("www", vec![net("192.168.1.80")])
        .with_host("ns1", vec![net("192.168.0.53")])
        .with_host("ns2", vec![net("192.168.1.53")])
        .with_host("lan", vec![net("192.168.0.0/24")])
}

/// Services table with the handful of names used by tests.
pub fn test_services() -> ServiceTable {
    [("ssh", 22), ("domain", 53), ("http", 80), ("https", 443)]
        .into_iter()
        .collect()
}

/// The canonical factory for tests.
pub fn test_factory() -> RuleFactory<StaticResolver> {
    RuleFactory::new(test_resolver(), test_services())
}
