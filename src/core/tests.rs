//! End-to-end scenarios: intents through the factory and the netfilter backend

use crate::core::error::Error;
use crate::core::firewall::{Action, AddressFamily, Direction, Interface, Protocol, Rule};
use crate::core::intent::{EndpointSpec, HostSpec, Intent, PortSpec, ProtoSpec};
use crate::core::netfilter::{Formatter, Netfilter};
use crate::core::profiles::HostPolicy;
use crate::core::test_helpers::test_factory;
use chrono::{NaiveDate, NaiveDateTime};

fn y2k() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn render(rules: &[Rule]) -> Vec<String> {
    let formatter = Netfilter::new();
    rules.iter().map(|rule| formatter.emit_rule(rule)).collect()
}

fn dns_out() -> Intent {
    Intent {
        dir: Some(Direction::Out),
        proto: ProtoSpec::One(Protocol::Udp),
        to: EndpointSpec::new(vec!["ns1", "ns2"], PortSpec::Service("domain".into())),
        ..Intent::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Full rulesets
// ═══════════════════════════════════════════════════════════════════════════

const GATEWAY: &str = r#"{
    "policy": "block",
    "rules": [
        { "dir": "in", "on": "ppp0", "proto": "tcp",
          "to": { "port": "http" }, "rdr_to": { "host": "www" } },
        { "dir": "fwd", "on": "ppp0", "proto": "tcp",
          "to": { "host": "www", "port": "http" } },
        { "dir": "out", "on": "ppp0", "nat_to": "198.51.100.72" },
        { "dir": "out", "proto": "udp",
          "to": { "host": ["ns1", "ns2"], "port": "domain" } }
    ]
}"#;

const WEB_SERVER: &str = r#"{
    "rules": [
        { "proto": "tcp", "to": { "port": 80 } },
        { "dir": "out", "proto": "udp",
          "to": { "host": ["ns1", "ns2"], "port": "domain" } }
    ]
}"#;

#[test]
fn test_gateway_ruleset() {
    let policy = HostPolicy::from_json(GATEWAY).unwrap();
    let ruleset = policy.compile(&test_factory(), Action::Pass).unwrap();
    assert_eq!(ruleset.default_policy, Action::Block);

    let text = Netfilter::at(y2k()).emit_ruleset(&ruleset.rules, ruleset.default_policy);
    assert_eq!(
        text,
        "\
# Generated by melt v1.0.0 on Sat Jan  1 00:00:00 2000
*nat
:PREROUTING ACCEPT [0:0]
:INPUT ACCEPT [0:0]
:OUTPUT ACCEPT [0:0]
:POSTROUTING ACCEPT [0:0]
-A PREROUTING -i ppp0 -p tcp --dport 80 -j DNAT --to-destination 192.168.1.80
-A POSTROUTING -o ppp0 -j MASQUERADE
COMMIT
*filter
:INPUT DROP [0:0]
:FORWARD DROP [0:0]
:OUTPUT DROP [0:0]
-A INPUT -m state --state ESTABLISHED,RELATED -j ACCEPT
-A FORWARD -m state --state ESTABLISHED,RELATED -j ACCEPT
-A FORWARD -i ppp0 -p tcp -d 192.168.1.80 --dport 80 -j ACCEPT
-A OUTPUT -m state --state ESTABLISHED,RELATED -j ACCEPT
-A OUTPUT -p udp -d 192.168.0.53 --dport 53 -j ACCEPT
-A OUTPUT -p udp -d 192.168.1.53 --dport 53 -j ACCEPT
COMMIT
"
    );
}

#[test]
fn test_web_server_ruleset() {
    let policy = HostPolicy::from_json(WEB_SERVER).unwrap();
    let ruleset = policy.compile(&test_factory(), Action::Block).unwrap();

    let text = Netfilter::at(y2k()).emit_ruleset(&ruleset.rules, ruleset.default_policy);
    assert_eq!(
        text,
        "\
# Generated by melt v1.0.0 on Sat Jan  1 00:00:00 2000
*filter
:INPUT DROP [0:0]
:FORWARD DROP [0:0]
:OUTPUT DROP [0:0]
-A INPUT -m state --state ESTABLISHED,RELATED -j ACCEPT
-A INPUT -p tcp --dport 80 -j ACCEPT
-A FORWARD -m state --state ESTABLISHED,RELATED -j ACCEPT
-A OUTPUT -m state --state ESTABLISHED,RELATED -j ACCEPT
-A OUTPUT -p udp -d 192.168.0.53 --dport 53 -j ACCEPT
-A OUTPUT -p udp -d 192.168.1.53 --dport 53 -j ACCEPT
COMMIT
"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Single intents
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_service_lists_expand_per_name() {
    let rules = test_factory().build(&dns_out()).unwrap().into_rules();
    assert_eq!(
        render(&rules),
        vec![
            "-A OUTPUT -p udp -d 192.168.0.53 --dport 53 -j ACCEPT",
            "-A OUTPUT -p udp -d 192.168.1.53 --dport 53 -j ACCEPT",
        ]
    );
}

#[test]
fn test_dual_stack_split_by_scope() {
    let factory = test_factory();
    let ssh = Intent {
        proto: ProtoSpec::One(Protocol::Tcp),
        to: EndpointSpec::new("dualstack", PortSpec::Service("ssh".into())),
        ..Intent::default()
    };

    let v4 = factory.ipv4(|scope| scope.build(&ssh)).unwrap();
    let v6 = factory.ipv6(|scope| scope.build(&ssh)).unwrap();
    assert_eq!(
        render(&v4.kept),
        vec!["-A INPUT -p tcp -d 192.0.2.10 --dport 22 -j ACCEPT"]
    );
    assert_eq!(
        render(&v6.kept),
        vec!["-A INPUT -p tcp -d 2001:db8::10 --dport 22 -j ACCEPT"]
    );
}

#[test]
fn test_mixed_family_pairs_vanish() {
    let intent = Intent {
        dir: Some(Direction::Fwd),
        from: EndpointSpec::host("lan"),
        to: EndpointSpec::host("dualstack"),
        ..Intent::default()
    };
    let batch = test_factory().build(&intent).unwrap();
    assert_eq!(batch.dropped, 1);
    assert_eq!(
        render(&batch.kept),
        vec!["-A FORWARD -s 192.168.0.0/24 -d 192.0.2.10 -j ACCEPT"]
    );
}

#[test]
fn test_explicit_family_conflicts_with_host() {
    let intent = Intent {
        af: Some(AddressFamily::Inet6.into()),
        to: EndpointSpec::host("www"),
        ..Intent::default()
    };
    let batch = test_factory().build(&intent).unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.dropped, 1);
}

#[test]
fn test_loopback_guard() {
    let intent = Intent {
        action: Some(Action::Block),
        on: Some(Interface::negated("lo")),
        to: EndpointSpec::host("127.0.0.0/8"),
        ..Intent::default()
    };
    let rules = test_factory().build(&intent).unwrap().into_rules();
    assert_eq!(
        render(&rules),
        vec!["-A INPUT ! -i lo -d 127.0.0.0/8 -j DROP"]
    );
}

#[test]
fn test_transparent_proxy() {
    let intent = Intent {
        on: Some(Interface::new("eth0")),
        proto: ProtoSpec::One(Protocol::Tcp),
        to: EndpointSpec::port(PortSpec::Service("http".into())),
        rdr_to: EndpointSpec::new("127.0.0.1", 3128u16),
        ..Intent::default()
    };
    let rules = test_factory().build(&intent).unwrap().into_rules();
    assert_eq!(
        render(&rules),
        vec!["-A PREROUTING -i eth0 -p tcp --dport 80 -j REDIRECT --to-port 3128"]
    );
}

#[test]
fn test_port_forward_to_other_port() {
    let intent = Intent {
        on: Some(Interface::new("ppp0")),
        proto: ProtoSpec::One(Protocol::Tcp),
        to: EndpointSpec::port(PortSpec::Service("https".into())),
        rdr_to: EndpointSpec::new("www", 8443u16),
        ..Intent::default()
    };
    let rules = test_factory().build(&intent).unwrap().into_rules();
    assert_eq!(
        render(&rules),
        vec![
            "-A PREROUTING -i ppp0 -p tcp --dport 443 -j DNAT --to-destination 192.168.1.80:8443"
        ]
    );
}

#[test]
fn test_unknown_host_stops_compilation() {
    let policy = HostPolicy {
        rules: vec![
            dns_out(),
            Intent {
                to: EndpointSpec::host(HostSpec::One("nowhere".into())),
                ..Intent::default()
            },
        ],
        ..HostPolicy::default()
    };
    let err = policy.compile(&test_factory(), Action::Block).unwrap_err();
    assert!(matches!(err, Error::Resolution { ref name, .. } if name == "nowhere"));
}
