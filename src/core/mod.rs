//! Core firewall compilation functionality
//!
//! This module contains the two stages of the compiler and their inputs:
//!
//! - [`intent`]: Pre-resolution rule intents (what policy authors write)
//! - [`factory`]: Resolution, cartesian expansion and address-family filtering
//! - [`firewall`]: Validated rules and rulesets
//! - [`netfilter`]: Rendering rules and rulesets to iptables-restore text
//! - [`resolver`]: Host name resolution
//! - [`services`]: Service name to port table
//! - [`profiles`]: Host policy documents
//! - [`error`]: Error types for compilation
//! - [`rule_constraints`]: Facts about valid field combinations

pub mod error;
pub mod factory;
pub mod firewall;
pub mod intent;
pub mod netfilter;
pub mod profiles;
pub mod resolver;
pub mod rule_constraints;
pub mod services;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
