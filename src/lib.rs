//! melt - firewall intent compiler
//!
//! Compiles declarative firewall intents into `iptables-restore` rulesets.
//!
//! # Architecture
//!
//! - [`core`] - Intents, the rule factory, rules and the netfilter formatter
//! - [`config`] - Configuration file
//! - [`validators`] - Input validation for ports and interfaces
//! - [`utils`] - XDG directories and atomic file output
//!
//! # Pipeline
//!
//! ```text
//! Intent ──RuleFactory──▶ Vec<Rule> ──Netfilter──▶ iptables-restore text
//!          resolve, expand,             emit_rule / emit_ruleset
//!          filter by family
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::factory::{Batch, RuleFactory};
pub use core::firewall::{Action, AddressFamily, Rule, Ruleset};
pub use core::intent::Intent;
pub use core::netfilter::{Formatter, Netfilter};
