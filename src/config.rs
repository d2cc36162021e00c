//! Application configuration
//!
//! Read from `config.json` in the XDG config directory, or from an explicit
//! path. Every field is optional.

use crate::core::error::Result;
use crate::core::firewall::Action;
use crate::core::resolver::{StaticResolver, SystemResolver};
use crate::core::services::{DEFAULT_SERVICES_PATH, ServiceTable};
use crate::utils::get_config_dir;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// services(5) database used for port names
    pub services_path: PathBuf,
    /// Filter chain policy when a host policy does not set one
    pub default_policy: Action,
    /// Host names resolved before asking the system resolver
    pub hosts: HashMap<String, Vec<IpNetwork>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services_path: PathBuf::from(DEFAULT_SERVICES_PATH),
            default_policy: Action::Block,
            hosts: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolver honoring the configured host table.
    pub fn resolver(&self) -> SystemResolver {
        SystemResolver::with_overrides(StaticResolver::from(self.hosts.clone()))
    }

    /// Loads the configured services database.
    pub fn services(&self) -> Result<ServiceTable> {
        ServiceTable::load(&self.services_path)
    }
}

/// Location of the default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

/// Loads the configuration.
///
/// An explicit `path` must exist. Without one, the default location is
/// tried and a missing file yields [`Config::default`].
///
/// # Errors
///
/// Returns `Err` if the file cannot be read or is not valid JSON.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("No configuration file, using defaults");
                return Ok(Config::default());
            }
        },
    };

    debug!("Loading configuration from {}", path.display());
    let json = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::resolver::AddressResolver;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.services_path, Path::new("/etc/services"));
        assert_eq!(config.default_policy, Action::Block);
    }

    #[test]
    fn test_host_overrides_reach_resolver() {
        let config: Config = serde_json::from_str(
            r#"{"default_policy": "pass", "hosts": {"gw": ["10.0.0.1", "2001:db8::1"]}}"#,
        )
        .unwrap();
        assert_eq!(config.default_policy, Action::Pass);
        assert_eq!(config.resolver().resolve("gw").unwrap().len(), 2);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"services_path": "/tmp/services"}"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.services_path, Path::new("/tmp/services"));
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_policy": "reject"}"#).unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_explicit_path() {
        assert!(matches!(
            load_config(Some(Path::new("/nonexistent/melt.json"))),
            Err(Error::Io(_))
        ));
    }
}
