//! Netfilter (iptables-restore) rendering
//!
//! [`Formatter`] is the contract every backend implements: one rule to one
//! line, and a whole ruleset to the complete configuration text. [`Netfilter`]
//! renders the `iptables-restore` grammar:
//!
//! ```text
//! -A <CHAIN> [! -i <on> | -i|-o <on> | -i <in> -o <out>] [-p <proto>]
//!    [-s <from.host>] [--sport <from.port>]
//!    [-d <to.host>] [--dport <to.port>]
//!    -j <TARGET> [<target-args>]
//! ```
//!
//! Rules with `rdr_to` land in `nat/PREROUTING`, rules with `nat_to` in
//! `nat/POSTROUTING`; everything else goes to the `filter` chain of its
//! direction.

use crate::core::firewall::{Action, Direction, Port, Rule};
use crate::core::rule_constraints::{is_loopback, is_single_host};
use chrono::{Local, NaiveDateTime};
use ipnetwork::IpNetwork;
use std::fmt::Write;

/// Generator name written in the ruleset header
pub const GENERATOR: &str = env!("CARGO_PKG_NAME");
/// Generator version written in the ruleset header
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ctime(3)-style timestamp (`Sat Jan  1 00:00:00 2000`)
const HEADER_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Renders rules into a backend's textual grammar
pub trait Formatter {
    /// Renders a single rule as one line (no trailing newline).
    fn emit_rule(&self, rule: &Rule) -> String;

    /// Renders the complete configuration for `rules` with the given
    /// default policy for filtering chains.
    fn emit_ruleset(&self, rules: &[Rule], default_policy: Action) -> String;
}

/// Netfilter tables, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum Table {
    #[strum(serialize = "nat")]
    Nat,
    #[strum(serialize = "filter")]
    Filter,
}

impl Table {
    /// Built-in chains, in declaration order
    pub const fn chains(self) -> &'static [&'static str] {
        match self {
            Table::Nat => &["PREROUTING", "INPUT", "OUTPUT", "POSTROUTING"],
            Table::Filter => &["INPUT", "FORWARD", "OUTPUT"],
        }
    }

    /// Table a rule is rendered into
    pub fn of(rule: &Rule) -> Self {
        if rule.is_nat() { Table::Nat } else { Table::Filter }
    }
}

/// Chain a rule is appended to
pub fn chain_of(rule: &Rule) -> &'static str {
    let spec = rule.spec();
    if rule.has_redirect() {
        "PREROUTING"
    } else if spec.nat_to.is_some() {
        "POSTROUTING"
    } else {
        match spec.dir {
            Direction::In => "INPUT",
            Direction::Out => "OUTPUT",
            Direction::Fwd => "FORWARD",
        }
    }
}

/// Renders a match address: bare address for single hosts, CIDR otherwise.
fn host(net: &IpNetwork) -> String {
    if is_single_host(net) {
        net.ip().to_string()
    } else {
        net.to_string()
    }
}

/// Renders a port for NAT target arguments (`lo-hi` ranges).
fn nat_port(port: Port) -> String {
    match port {
        Port::Number(port) => port.to_string(),
        Port::Range(lo, hi) => format!("{lo}-{hi}"),
    }
}

/// iptables-restore backend
#[derive(Debug, Clone, Copy, Default)]
pub struct Netfilter {
    clock: Option<NaiveDateTime>,
}

impl Netfilter {
    /// Formatter stamping rulesets with the current local time
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatter stamping rulesets with a fixed time
    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self {
            clock: Some(timestamp),
        }
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.clock.unwrap_or_else(|| Local::now().naive_local())
    }

    /// Forwarded rules with `in`/`out` render those instead of `on`.
    /// A negated `on` always uses `-i`.
    fn write_interfaces(out: &mut String, rule: &Rule, chain: &str) {
        let spec = rule.spec();
        let routed = spec.dir == Direction::Fwd
            && (spec.in_iface.is_some() || spec.out_iface.is_some());

        if routed {
            if let Some(ref iface) = spec.in_iface {
                let _ = write!(out, " -i {iface}");
            }
            if let Some(ref iface) = spec.out_iface {
                let _ = write!(out, " -o {iface}");
            }
        } else if let Some(ref on) = spec.on {
            if on.negated {
                let _ = write!(out, " ! -i {}", on.name);
            } else {
                let flag = match chain {
                    "OUTPUT" | "POSTROUTING" => "-o",
                    _ => "-i",
                };
                let _ = write!(out, " {flag} {}", on.name);
            }
        }
    }

    fn target(rule: &Rule) -> String {
        let spec = rule.spec();
        if spec.r#return {
            return "RETURN".to_string();
        }

        if rule.has_redirect() {
            let rdr = &spec.rdr_to;
            return match rdr.host {
                Some(ref dest) if !is_loopback(dest) => {
                    match rdr.port.filter(|_| rdr.port != spec.to.port) {
                        None => format!("DNAT --to-destination {}", dest.ip()),
                        Some(port) if dest.is_ipv6() => {
                            format!("DNAT --to-destination [{}]:{}", dest.ip(), nat_port(port))
                        }
                        Some(port) => {
                            format!("DNAT --to-destination {}:{}", dest.ip(), nat_port(port))
                        }
                    }
                }
                _ => match rdr.port {
                    Some(port) => format!("REDIRECT --to-port {}", nat_port(port)),
                    None => "REDIRECT".to_string(),
                },
            };
        }

        if spec.nat_to.is_some() {
            return "MASQUERADE".to_string();
        }

        spec.action.verdict().to_string()
    }

    fn write_table(&self, out: &mut String, table: Table, rules: &[&Rule], policy: &str) {
        let _ = writeln!(out, "*{table}");
        for chain in table.chains() {
            let _ = writeln!(out, ":{chain} {policy} [0:0]");
        }
        for chain in table.chains() {
            if table == Table::Filter {
                let _ = writeln!(
                    out,
                    "-A {chain} -m state --state ESTABLISHED,RELATED -j ACCEPT"
                );
            }
            for rule in rules.iter().filter(|rule| chain_of(rule) == *chain) {
                let _ = writeln!(out, "{}", self.emit_rule(rule));
            }
        }
        let _ = writeln!(out, "COMMIT");
    }
}

impl Formatter for Netfilter {
    fn emit_rule(&self, rule: &Rule) -> String {
        let spec = rule.spec();
        let chain = chain_of(rule);

        // Fixed clause order: interfaces, protocol, source, destination, target
        let mut out = format!("-A {chain}");
        Self::write_interfaces(&mut out, rule, chain);
        if let Some(proto) = spec.proto {
            let _ = write!(out, " -p {proto}");
        }
        if let Some(ref src) = spec.from.host {
            let _ = write!(out, " -s {}", host(src));
        }
        if let Some(port) = spec.from.port {
            let _ = write!(out, " --sport {port}");
        }
        if let Some(ref dst) = spec.to.host {
            let _ = write!(out, " -d {}", host(dst));
        }
        if let Some(port) = spec.to.port {
            let _ = write!(out, " --dport {port}");
        }
        let _ = write!(out, " -j {}", Self::target(rule));
        out
    }

    fn emit_ruleset(&self, rules: &[Rule], default_policy: Action) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# Generated by {GENERATOR} v{VERSION} on {}",
            self.timestamp().format(HEADER_TIME_FORMAT)
        );

        let (nat, filter): (Vec<&Rule>, Vec<&Rule>) =
            rules.iter().partition(|rule| Table::of(rule) == Table::Nat);

        if !nat.is_empty() {
            self.write_table(&mut out, Table::Nat, &nat, Action::Pass.verdict());
        }
        self.write_table(&mut out, Table::Filter, &filter, default_policy.verdict());
        out
    }
}
