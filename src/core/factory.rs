//! Rule factory: resolution, expansion and address-family filtering
//!
//! [`RuleFactory::build`] compiles one [`Intent`] into concrete rules:
//!
//! 1. An empty intent yields an empty batch.
//! 2. Unset fields take their defaults (`pass`, `in`, absent endpoints).
//! 3. Hosts are resolved through the [`AddressResolver`]; ports are checked
//!    and service names are looked up in the [`ServiceTable`].
//! 4. The cartesian product of all alternative lists is taken, in the fixed
//!    field order `proto`, `from.host`, `from.port`, `to.host`, `to.port`,
//!    `nat_to`, `rdr_to.host`, `rdr_to.port` (first field varies slowest).
//! 5. Each combination becomes a [`Rule`]; combinations mixing address
//!    families are dropped and counted in [`Batch::dropped`].
//! 6. Within a family scope, rules of the other family are counted in
//!    [`Batch::out_of_scope`] and left out.
//!
//! Scopes are entered with [`RuleFactory::with_family`] (or the
//! [`ipv4`](RuleFactory::ipv4) / [`ipv6`](RuleFactory::ipv6) shorthands). The
//! scoped handle can only build, so scopes cannot nest.
//!
//! # Example
//!
//! ```
//! use melt::core::factory::RuleFactory;
//! use melt::core::intent::{EndpointSpec, Intent, PortSpec};
//! use melt::core::resolver::StaticResolver;
//! use melt::core::services::ServiceTable;
//!
//! let services = ServiceTable::parse("http 80/tcp\n");
//! let factory = RuleFactory::new(StaticResolver::new(), services);
//!
//! let intent = Intent {
//!     to: EndpointSpec::new(
//!         vec!["192.168.0.1", "2001:db8::1"],
//!         PortSpec::Service("http".into()),
//!     ),
//!     ..Intent::default()
//! };
//! let batch = factory.ipv4(|scope| scope.build(&intent)).unwrap();
//! assert_eq!(batch.kept.len(), 1);
//! assert_eq!(batch.out_of_scope, 1);
//! ```

use crate::core::error::{Error, Result};
use crate::core::firewall::{AddressFamily, Endpoint, Port, Protocol, Rule, RuleSpec};
use crate::core::intent::{FamilySpec, HostSpec, Intent, PortSpec};
use crate::core::resolver::AddressResolver;
use crate::core::rule_constraints::{family_in_scope, protocol_family, protocol_supports_ports};
use crate::core::services::ServiceTable;
use crate::validators::{validate_interface, validate_port, validate_port_range};
use ipnetwork::IpNetwork;
use tracing::{debug, trace, warn};

/// Outcome of one [`RuleFactory::build`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Rules kept, in expansion order
    pub kept: Vec<Rule>,
    /// Combinations rejected for mixing address families
    pub dropped: usize,
    /// Valid rules left out by the active family scope
    pub out_of_scope: usize,
}

impl Batch {
    /// Number of rule constructions attempted (the size of the expansion)
    pub fn attempts(&self) -> usize {
        self.kept.len() + self.dropped + self.out_of_scope
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.kept
    }
}

impl IntoIterator for Batch {
    type Item = Rule;
    type IntoIter = std::vec::IntoIter<Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.kept.into_iter()
    }
}

/// A resolved port field, keeping the nesting of the intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPort {
    Absent,
    Port(Port),
    Many(Vec<ResolvedPort>),
}

impl ResolvedPort {
    /// Leaf ports in order, `None` standing for "any port"
    pub fn alternatives(&self) -> Vec<Option<Port>> {
        match self {
            ResolvedPort::Absent => vec![None],
            ResolvedPort::Port(port) => vec![Some(*port)],
            ResolvedPort::Many(items) => items.iter().flat_map(Self::alternatives).collect(),
        }
    }
}

/// Alternatives of every expandable field, after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
struct Alternatives {
    proto: Vec<Option<Protocol>>,
    from_host: Vec<Option<IpNetwork>>,
    from_port: Vec<Option<Port>>,
    to_host: Vec<Option<IpNetwork>>,
    to_port: Vec<Option<Port>>,
    nat_to: Vec<Option<IpNetwork>>,
    rdr_host: Vec<Option<IpNetwork>>,
    rdr_port: Vec<Option<Port>>,
}

impl Alternatives {
    fn lens(&self) -> [usize; 8] {
        [
            self.proto.len(),
            self.from_host.len(),
            self.from_port.len(),
            self.to_host.len(),
            self.to_port.len(),
            self.nat_to.len(),
            self.rdr_host.len(),
            self.rdr_port.len(),
        ]
    }

    /// Applies the combination `idx` (indices in [`lens`](Self::lens) order) to `template`.
    fn pick(&self, template: &RuleSpec, idx: &[usize]) -> RuleSpec {
        RuleSpec {
            proto: self.proto[idx[0]],
            from: Endpoint {
                host: self.from_host[idx[1]],
                port: self.from_port[idx[2]],
            },
            to: Endpoint {
                host: self.to_host[idx[3]],
                port: self.to_port[idx[4]],
            },
            nat_to: self.nat_to[idx[5]],
            rdr_to: Endpoint {
                host: self.rdr_host[idx[6]],
                port: self.rdr_port[idx[7]],
            },
            ..template.clone()
        }
    }
}

/// Enumerates every index combination for lists of the given lengths.
///
/// The last position varies fastest. The number of combinations is the
/// product of `lens`; any zero length yields no combination.
pub fn cartesian(lens: &[usize]) -> Vec<Vec<usize>> {
    if lens.contains(&0) {
        return Vec::new();
    }
    let total = lens.iter().product();
    let mut combos = Vec::with_capacity(total);
    let mut current = vec![0; lens.len()];
    for _ in 0..total {
        combos.push(current.clone());
        for pos in (0..lens.len()).rev() {
            current[pos] += 1;
            if current[pos] < lens[pos] {
                break;
            }
            current[pos] = 0;
        }
    }
    combos
}

/// Builds concrete rules from intents
#[derive(Debug, Clone)]
pub struct RuleFactory<R> {
    resolver: R,
    services: ServiceTable,
}

impl<R: AddressResolver> RuleFactory<R> {
    pub fn new(resolver: R, services: ServiceTable) -> Self {
        Self { resolver, services }
    }

    pub fn services(&self) -> &ServiceTable {
        &self.services
    }

    /// Builds the rules of `intent` without a family scope.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a host cannot be resolved, a service is unknown, or a
    /// port or interface is invalid. Family conflicts are not errors; see
    /// [`Batch::dropped`].
    pub fn build(&self, intent: &Intent) -> Result<Batch> {
        self.build_in(intent, None)
    }

    /// Runs `body` with a handle whose builds keep only rules of family `af`
    /// (or of no particular family).
    pub fn with_family<T>(
        &self,
        af: AddressFamily,
        body: impl FnOnce(&ScopedFactory<'_, R>) -> T,
    ) -> T {
        debug!("Entering {af} scope");
        let scoped = ScopedFactory {
            factory: self,
            scope: af,
        };
        let result = body(&scoped);
        debug!("Leaving {af} scope");
        result
    }

    /// Shorthand for `with_family(AddressFamily::Inet, body)`.
    pub fn ipv4<T>(&self, body: impl FnOnce(&ScopedFactory<'_, R>) -> T) -> T {
        self.with_family(AddressFamily::Inet, body)
    }

    /// Shorthand for `with_family(AddressFamily::Inet6, body)`.
    pub fn ipv6<T>(&self, body: impl FnOnce(&ScopedFactory<'_, R>) -> T) -> T {
        self.with_family(AddressFamily::Inet6, body)
    }

    fn build_in(&self, intent: &Intent, scope: Option<AddressFamily>) -> Result<Batch> {
        if intent.is_empty() {
            return Ok(Batch::default());
        }

        let template = self.template(intent)?;
        let alternatives = self.resolve(intent)?;

        let mut batch = Batch::default();
        for idx in cartesian(&alternatives.lens()) {
            let spec = alternatives.pick(&template, &idx);
            let rule = match Rule::new(spec) {
                Ok(rule) => rule,
                Err(conflict) => {
                    debug!("Dropping expansion {idx:?}: {conflict}");
                    batch.dropped += 1;
                    continue;
                }
            };
            if !family_in_scope(rule.af(), scope) {
                trace!("Expansion {idx:?} is outside the {scope:?} scope");
                batch.out_of_scope += 1;
                continue;
            }
            Self::lint(&rule);
            batch.kept.push(rule);
        }

        debug!(
            "Built {} rule(s), dropped {}, {} out of scope",
            batch.kept.len(),
            batch.dropped,
            batch.out_of_scope
        );
        Ok(batch)
    }

    /// Non-expandable fields of `intent`, with defaults applied.
    fn template(&self, intent: &Intent) -> Result<RuleSpec> {
        let check_iface = |field: &str, name: &Option<String>| -> Result<Option<String>> {
            name.as_deref()
                .map(validate_interface)
                .transpose()
                .map_err(|message| Error::validation(field, message))
        };

        Ok(RuleSpec {
            action: intent.action.unwrap_or_default(),
            r#return: intent.r#return.unwrap_or_default(),
            dir: intent.dir.unwrap_or_default(),
            af: intent.af.and_then(FamilySpec::family),
            on: intent.on.clone(),
            in_iface: check_iface("in", &intent.in_iface)?,
            out_iface: check_iface("out", &intent.out_iface)?,
            ..RuleSpec::default()
        })
    }

    fn resolve(&self, intent: &Intent) -> Result<Alternatives> {
        Ok(Alternatives {
            proto: intent.proto.alternatives(),
            from_host: self.resolve_host(&intent.from.host)?,
            from_port: self.resolve_port(&intent.from.port, "from.port")?.alternatives(),
            to_host: self.resolve_host(&intent.to.host)?,
            to_port: self.resolve_port(&intent.to.port, "to.port")?.alternatives(),
            nat_to: self.resolve_host(&intent.nat_to)?,
            rdr_host: self.resolve_host(&intent.rdr_to.host)?,
            rdr_port: self.resolve_port(&intent.rdr_to.port, "rdr_to.port")?.alternatives(),
        })
    }

    /// Resolves a host field into its alternatives.
    ///
    /// Every address of a name is a separate alternative; lists are resolved
    /// element-wise and flattened one level.
    ///
    /// # Errors
    ///
    /// Propagates resolver failures.
    pub fn resolve_host(&self, host: &HostSpec) -> Result<Vec<Option<IpNetwork>>> {
        let names: &[String] = match host {
            HostSpec::Absent => return Ok(vec![None]),
            HostSpec::One(name) => std::slice::from_ref(name),
            HostSpec::Many(names) => names,
        };

        let mut resolved = Vec::new();
        for name in names {
            let addresses = self.resolver.resolve(name)?;
            trace!("{name} -> {addresses:?}");
            resolved.extend(addresses.into_iter().map(Some));
        }
        Ok(resolved)
    }

    /// Resolves a port field, keeping its nesting.
    ///
    /// Numbers and ranges pass through after validation; service names are
    /// looked up in the services table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownService`] for names missing from the table and
    /// [`Error::Validation`] for port 0 or inverted ranges.
    pub fn resolve_port(&self, port: &PortSpec, field: &str) -> Result<ResolvedPort> {
        let invalid = |message: String| Error::validation(field, message);
        match port {
            PortSpec::Absent => Ok(ResolvedPort::Absent),
            PortSpec::Number(number) => validate_port(*number)
                .map(|n| ResolvedPort::Port(Port::Number(n)))
                .map_err(invalid),
            PortSpec::Range(lo, hi) => validate_port_range(*lo, *hi)
                .map(|(lo, hi)| ResolvedPort::Port(Port::Range(lo, hi)))
                .map_err(invalid),
            PortSpec::Service(name) => self
                .services
                .lookup(name)
                .map(|n| ResolvedPort::Port(Port::Number(n)))
                .ok_or_else(|| Error::UnknownService(name.clone())),
            PortSpec::Many(items) => items
                .iter()
                .map(|item| self.resolve_port(item, field))
                .collect::<Result<_>>()
                .map(ResolvedPort::Many),
        }
    }

    /// Warns about rules that are valid but unlikely to match what was meant.
    fn lint(rule: &Rule) {
        let spec = rule.spec();
        let Some(proto) = spec.proto else {
            return;
        };
        let has_ports = [spec.from.port, spec.to.port].iter().any(Option::is_some);
        if has_ports && !protocol_supports_ports(proto) {
            warn!("Protocol {proto} does not carry ports; port matches will be rejected by the backend");
        }
        if let (Some(bound), Some(af)) = (protocol_family(proto), rule.af())
            && bound != af
        {
            warn!("Protocol {proto} never matches {af} traffic");
        }
    }
}

/// A [`RuleFactory`] restricted to one address family
///
/// Only obtainable inside [`RuleFactory::with_family`]; it has no way to
/// enter another scope.
#[derive(Debug)]
pub struct ScopedFactory<'a, R> {
    factory: &'a RuleFactory<R>,
    scope: AddressFamily,
}

impl<R: AddressResolver> ScopedFactory<'_, R> {
    /// Builds the rules of `intent`, keeping only those compatible with the scope.
    ///
    /// # Errors
    ///
    /// Same as [`RuleFactory::build`].
    pub fn build(&self, intent: &Intent) -> Result<Batch> {
        self.factory.build_in(intent, Some(self.scope))
    }

    pub fn scope(&self) -> AddressFamily {
        self.scope
    }
}
