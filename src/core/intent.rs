//! Pre-resolution rule intent
//!
//! An [`Intent`] is what a policy author writes: hosts are names or address
//! literals, ports are numbers, `lo:hi` ranges or service names, and any of
//! the expandable fields may hold a list of alternatives. The
//! [`RuleFactory`](crate::core::factory::RuleFactory) resolves and expands an
//! intent into concrete [`Rule`](crate::core::firewall::Rule)s.
//!
//! Intents deserialize from JSON:
//!
//! ```
//! use melt::core::intent::{HostSpec, Intent, PortSpec};
//!
//! let intent: Intent = serde_json::from_str(r#"{
//!     "action": "pass", "dir": "out", "proto": "udp",
//!     "to": { "host": ["ns1", "ns2"], "port": "domain" }
//! }"#).unwrap();
//! assert_eq!(intent.to.host, HostSpec::Many(vec!["ns1".into(), "ns2".into()]));
//! assert_eq!(intent.to.port, PortSpec::Service("domain".into()));
//! ```

use crate::core::firewall::{Action, AddressFamily, Direction, Interface, Protocol};
use crate::validators::{is_digits, parse_port_range};
use serde::Deserialize;
use std::str::FromStr;

/// Host field of an intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HostSpec {
    #[default]
    Absent,
    /// A name or address literal; may resolve to several addresses
    One(String),
    /// Alternatives, each resolved and expanded separately
    Many(Vec<String>),
}

impl From<&str> for HostSpec {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<&str>> for HostSpec {
    fn from(value: Vec<&str>) -> Self {
        Self::Many(value.into_iter().map(str::to_string).collect())
    }
}

/// Port field of an intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPortSpec")]
pub enum PortSpec {
    #[default]
    Absent,
    Number(u16),
    Range(u16, u16),
    /// Service name looked up in the services table
    Service(String),
    /// Alternatives; nested lists keep their shape through resolution
    Many(Vec<PortSpec>),
}

impl From<u16> for PortSpec {
    fn from(value: u16) -> Self {
        Self::Number(value)
    }
}

impl FromStr for PortSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_digits(s) {
            return s
                .parse()
                .map(PortSpec::Number)
                .map_err(|_| format!("Port {s} is out of range (max 65535)"));
        }
        match parse_port_range(s) {
            Some(range) => range.map(|(lo, hi)| PortSpec::Range(lo, hi)),
            None if s.is_empty() => Err("Port cannot be empty".to_string()),
            None => Ok(PortSpec::Service(s.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPortSpec {
    Absent,
    Number(u16),
    Text(String),
    Many(Vec<RawPortSpec>),
}

impl TryFrom<RawPortSpec> for PortSpec {
    type Error = String;

    fn try_from(raw: RawPortSpec) -> Result<Self, Self::Error> {
        match raw {
            RawPortSpec::Absent => Ok(PortSpec::Absent),
            RawPortSpec::Number(port) => Ok(PortSpec::Number(port)),
            RawPortSpec::Text(text) => text.parse(),
            RawPortSpec::Many(items) => items
                .into_iter()
                .map(PortSpec::try_from)
                .collect::<Result<_, _>>()
                .map(PortSpec::Many),
        }
    }
}

/// Protocol field of an intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ProtoSpec {
    #[default]
    Absent,
    One(Protocol),
    Many(Vec<Protocol>),
}

impl ProtoSpec {
    /// Alternatives in order, `None` standing for "any protocol"
    pub fn alternatives(&self) -> Vec<Option<Protocol>> {
        match self {
            ProtoSpec::Absent => vec![None],
            ProtoSpec::One(proto) => vec![Some(*proto)],
            ProtoSpec::Many(protos) => protos.iter().copied().map(Some).collect(),
        }
    }
}

impl From<Protocol> for ProtoSpec {
    fn from(value: Protocol) -> Self {
        Self::One(value)
    }
}

/// Address family field of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum FamilySpec {
    /// `any`: no family constraint
    Any,
    Only(AddressFamily),
}

impl FamilySpec {
    pub fn family(self) -> Option<AddressFamily> {
        match self {
            FamilySpec::Any => None,
            FamilySpec::Only(af) => Some(af),
        }
    }
}

impl From<AddressFamily> for FamilySpec {
    fn from(value: AddressFamily) -> Self {
        Self::Only(value)
    }
}

impl TryFrom<String> for FamilySpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "any" {
            return Ok(FamilySpec::Any);
        }
        value
            .parse()
            .map(FamilySpec::Only)
            .map_err(|_| format!("unknown address family `{value}`"))
    }
}

/// Host and port of one side of an intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointSpec {
    pub host: HostSpec,
    pub port: PortSpec,
}

impl EndpointSpec {
    pub fn host(host: impl Into<HostSpec>) -> Self {
        Self {
            host: host.into(),
            port: PortSpec::Absent,
        }
    }

    pub fn port(port: impl Into<PortSpec>) -> Self {
        Self {
            host: HostSpec::Absent,
            port: port.into(),
        }
    }

    pub fn new(host: impl Into<HostSpec>, port: impl Into<PortSpec>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }
}

/// A firewall intent as written by a policy author
///
/// Unset fields take the defaults documented on [`RuleSpec`](crate::core::firewall::RuleSpec):
/// `pass`, direction `in`, no family, no protocol, absent endpoints. Fields
/// that can be spelled with their default value (`action`, `return`, `dir`,
/// `af`) are optional so that supplying them is distinguishable from
/// leaving them out; a JSON `null` counts as left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Intent {
    pub action: Option<Action>,
    #[serde(rename = "return")]
    pub r#return: Option<bool>,
    pub dir: Option<Direction>,
    pub af: Option<FamilySpec>,
    pub proto: ProtoSpec,
    pub on: Option<Interface>,
    #[serde(rename = "in")]
    pub in_iface: Option<String>,
    #[serde(rename = "out")]
    pub out_iface: Option<String>,
    pub from: EndpointSpec,
    pub to: EndpointSpec,
    pub nat_to: HostSpec,
    pub rdr_to: EndpointSpec,
}

impl Intent {
    /// Returns `true` if no field was supplied
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
