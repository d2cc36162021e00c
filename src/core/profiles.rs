//! Host policy documents
//!
//! A profile is a JSON document holding the intents of one host:
//!
//! ```json
//! { "policy": "block",
//!   "rules": [ ... ],
//!   "ipv4":  [ ... ],
//!   "ipv6":  [ ... ] }
//! ```
//!
//! `rules` are built without a family scope, `ipv4` and `ipv6` inside the
//! matching scope. Stored profiles live in the application's data directory
//! under `profiles/`.

use crate::core::error::{Error, Result};
use crate::core::factory::RuleFactory;
use crate::core::firewall::{Action, AddressFamily, Ruleset};
use crate::core::intent::Intent;
use crate::core::resolver::AddressResolver;
use crate::utils::get_data_dir;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Error type for profile operations
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Invalid profile name: {0}")]
    InvalidName(String),

    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Data directory not available")]
    DataDirUnavailable,
}

/// Validates a profile name for filesystem safety.
///
/// Constraints:
/// - Alphanumeric, underscores, and hyphens only
/// - Max 64 chars
/// - Rejects "." and ".."
pub fn validate_profile_name(name: &str) -> std::result::Result<(), ProfileError> {
    if name.is_empty() {
        return Err(ProfileError::InvalidName("Name cannot be empty".into()));
    }

    if name.len() > 64 {
        return Err(ProfileError::InvalidName(
            "Name too long (max 64 chars)".into(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ProfileError::InvalidName(
            "Name contains invalid characters (use only a-z, 0-9, _, -)".into(),
        ));
    }

    // Prevent path traversal
    if name == "." || name == ".." {
        return Err(ProfileError::InvalidName("Invalid name".into()));
    }

    Ok(())
}

/// Gets the directory where profiles are stored, creating it if needed.
pub fn get_profiles_dir() -> Result<PathBuf> {
    let mut path = get_data_dir().ok_or(ProfileError::DataDirUnavailable)?;
    path.push("profiles");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

/// Returns the path of a stored profile. The name is validated first.
pub fn get_profile_path(name: &str) -> Result<PathBuf> {
    validate_profile_name(name)?;
    let mut path = get_profiles_dir()?;
    path.push(format!("{name}.json"));
    Ok(path)
}

/// Lists stored profile names, sorted.
pub fn list_profiles() -> Result<Vec<String>> {
    let dir = get_profiles_dir()?;
    let mut profiles = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_file()
            && path.extension().and_then(|s| s.to_str()) == Some("json")
            && let Some(name) = path.file_stem().and_then(|s| s.to_str())
        {
            profiles.push(name.to_string());
        }
    }

    profiles.sort();
    Ok(profiles)
}

/// Loads a stored profile by name.
pub fn load_profile(name: &str) -> Result<HostPolicy> {
    let path = get_profile_path(name)?;
    if !path.exists() {
        return Err(ProfileError::NotFound(name.to_string()).into());
    }
    HostPolicy::load(&path)
}

/// Loads a profile given either a file path or the name of a stored profile.
///
/// Arguments containing a path separator or ending in `.json`, and arguments
/// naming an existing file, are read as paths.
pub fn resolve_profile(arg: &str) -> Result<HostPolicy> {
    let path = Path::new(arg);
    if arg.contains(std::path::MAIN_SEPARATOR)
        || path.extension().is_some_and(|ext| ext == "json")
        || path.is_file()
    {
        return HostPolicy::load(path);
    }
    load_profile(arg)
}

/// The intents of one host
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostPolicy {
    /// Default policy of the filtering chains; falls back to the configuration
    pub policy: Option<Action>,
    /// Intents built without a family scope
    pub rules: Vec<Intent>,
    /// Intents built in the `inet` scope
    pub ipv4: Vec<Intent>,
    /// Intents built in the `inet6` scope
    pub ipv6: Vec<Intent>,
}

impl HostPolicy {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading host policy from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Builds every intent and collects the rules in order: `rules`, then
    /// `ipv4`, then `ipv6`.
    ///
    /// # Errors
    ///
    /// The first resolution or validation error aborts the whole compilation.
    pub fn compile<R: AddressResolver>(
        &self,
        factory: &RuleFactory<R>,
        fallback_policy: Action,
    ) -> Result<Ruleset> {
        let mut ruleset = Ruleset::new(self.policy.unwrap_or(fallback_policy));

        for intent in &self.rules {
            ruleset.extend(factory.build(intent)?);
        }
        for (af, intents) in [
            (AddressFamily::Inet, &self.ipv4),
            (AddressFamily::Inet6, &self.ipv6),
        ] {
            let rules = factory.with_family(af, |scope| {
                let mut rules = Vec::new();
                for intent in intents {
                    rules.extend(scope.build(intent)?);
                }
                Ok::<_, Error>(rules)
            })?;
            ruleset.extend(rules);
        }

        info!(
            "Compiled {} rule(s), default policy {}",
            ruleset.rules.len(),
            ruleset.default_policy
        );
        Ok(ruleset)
    }
}
