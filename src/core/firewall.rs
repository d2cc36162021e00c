//! Firewall rule data structures
//!
//! This module defines the concrete, fully-resolved representation of a
//! filtering decision. Rules are produced by the
//! [`RuleFactory`](crate::core::factory::RuleFactory) and rendered by a
//! [`Formatter`](crate::core::netfilter::Formatter).
//!
//! # Rule Structure
//!
//! A [`Rule`] wraps a [`RuleSpec`] with:
//! - Action (pass/block) and an optional `return` override
//! - Direction (in/out/fwd) which selects the chain
//! - Optional protocol and interface matches
//! - Source and destination [`Endpoint`]s
//! - Optional NAT (`nat_to`) and redirection (`rdr_to`) targets
//!
//! Every host in a rule carries an address family. [`Rule::new`] refuses
//! specs whose hosts (and explicit `af`) disagree on it.
//!
//! # Example
//!
//! ```
//! use melt::core::firewall::{Action, Direction, Endpoint, Port, Protocol, Rule, RuleSpec};
//!
//! let rule = Rule::new(RuleSpec {
//!     action: Action::Pass,
//!     dir: Direction::In,
//!     proto: Some(Protocol::Tcp),
//!     to: Endpoint::port(Port::Number(80)),
//!     ..RuleSpec::default()
//! })
//! .unwrap();
//! assert_eq!(rule.af(), None);
//! ```

use crate::core::error::AddressFamilyConflict;
use crate::core::rule_constraints::family_of;
use crate::validators::validate_interface;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address family of a rule or host
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// IPv4
    #[strum(serialize = "inet")]
    Inet,
    /// IPv6
    #[strum(serialize = "inet6")]
    Inet6,
}

/// Rule action (pass or block)
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Let the packet through
    #[default]
    #[strum(serialize = "pass")]
    Pass,
    /// Drop the packet silently
    #[strum(serialize = "block")]
    Block,
}

impl Action {
    /// Returns the netfilter verdict for this action
    pub const fn verdict(self) -> &'static str {
        match self {
            Action::Pass => "ACCEPT",
            Action::Block => "DROP",
        }
    }
}

/// Traffic direction, relative to the protected host
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic addressed to the host
    #[default]
    #[strum(serialize = "in")]
    In,
    /// Traffic originating from the host
    #[strum(serialize = "out")]
    Out,
    /// Traffic routed through the host
    #[strum(serialize = "fwd")]
    Fwd,
}

/// Layer 4 protocol match
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
    #[strum(serialize = "icmp")]
    Icmp,
    #[serde(rename = "ipv6-icmp")]
    #[strum(serialize = "ipv6-icmp")]
    Ipv6Icmp,
    #[strum(serialize = "sctp")]
    Sctp,
    #[strum(serialize = "gre")]
    Gre,
    #[strum(serialize = "esp")]
    Esp,
    #[strum(serialize = "ah")]
    Ah,
}

/// Interface match, optionally negated (`!lo`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interface {
    pub name: String,
    pub negated: bool,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            negated: false,
        }
    }

    pub fn negated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            negated: true,
        }
    }
}

impl FromStr for Interface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negated, name) = match s.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, s),
        };
        if name.is_empty() {
            return Err("Interface name cannot be empty".to_string());
        }
        let name = validate_interface(name)?;
        Ok(Self { name, negated })
    }
}

impl TryFrom<String> for Interface {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interface> for String {
    fn from(value: Interface) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// A concrete port match: one port or an inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Number(u16),
    Range(u16, u16),
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Number(port) => write!(f, "{port}"),
            Port::Range(lo, hi) => write!(f, "{lo}:{hi}"),
        }
    }
}

/// One side of a rule: a host (address or network) and a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub host: Option<IpNetwork>,
    pub port: Option<Port>,
}

impl Endpoint {
    pub fn host(host: IpNetwork) -> Self {
        Self {
            host: Some(host),
            port: None,
        }
    }

    pub fn port(port: Port) -> Self {
        Self {
            host: None,
            port: Some(port),
        }
    }

    pub fn new(host: IpNetwork, port: Port) -> Self {
        Self {
            host: Some(host),
            port: Some(port),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.host.is_none() && self.port.is_none()
    }
}

/// Field values of a single concrete rule, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSpec {
    pub action: Action,
    /// Return from the chain instead of taking `action`
    pub r#return: bool,
    pub dir: Direction,
    /// Explicitly requested address family
    pub af: Option<AddressFamily>,
    pub proto: Option<Protocol>,
    pub on: Option<Interface>,
    /// Input interface for forwarded traffic
    pub in_iface: Option<String>,
    /// Output interface for forwarded traffic
    pub out_iface: Option<String>,
    pub from: Endpoint,
    pub to: Endpoint,
    pub nat_to: Option<IpNetwork>,
    pub rdr_to: Endpoint,
}

impl RuleSpec {
    /// Hosts that imply an address family, in field order
    fn hosts(&self) -> impl Iterator<Item = &IpNetwork> {
        [
            self.from.host.as_ref(),
            self.to.host.as_ref(),
            self.nat_to.as_ref(),
            self.rdr_to.host.as_ref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// A validated, immutable firewall rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    spec: RuleSpec,
    af: Option<AddressFamily>,
}

impl Rule {
    /// Validates `spec` and computes its effective address family.
    ///
    /// # Errors
    ///
    /// Returns [`AddressFamilyConflict`] when the explicit `af` and the
    /// families of `from`, `to`, `nat_to` and `rdr_to` hosts disagree.
    pub fn new(spec: RuleSpec) -> Result<Self, AddressFamilyConflict> {
        let mut af = spec.af;
        for host in spec.hosts() {
            let implied = family_of(host);
            match af {
                None => af = Some(implied),
                Some(current) if current != implied => {
                    return Err(AddressFamilyConflict {
                        first: current,
                        second: implied,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(Self { spec, af })
    }

    /// Effective address family (`None` when the rule applies to both)
    pub fn af(&self) -> Option<AddressFamily> {
        self.af
    }

    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// Returns `true` if the rule renders into the `nat` table
    pub fn is_nat(&self) -> bool {
        self.spec.nat_to.is_some() || self.has_redirect()
    }

    /// Returns `true` if the rule redirects traffic (`rdr_to` is set)
    pub fn has_redirect(&self) -> bool {
        !self.spec.rdr_to.is_absent()
    }
}

/// Rules of one protected host, ready to be rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ruleset {
    pub rules: Vec<Rule>,
    /// Policy of the filter chains (`block` → DROP)
    pub default_policy: Action,
}

impl Ruleset {
    pub fn new(default_policy: Action) -> Self {
        Self {
            rules: Vec::new(),
            default_policy,
        }
    }
}

impl Extend<Rule> for Ruleset {
    fn extend<T: IntoIterator<Item = Rule>>(&mut self, iter: T) {
        self.rules.extend(iter);
    }
}
