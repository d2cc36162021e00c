//! Service name to port table
//!
//! Parsed once from a services(5) database (`/etc/services` by default) and
//! read-only afterwards. Each record is `name port[/proto] [aliases...]`;
//! `#` starts a comment, short lines are skipped and later records overwrite
//! earlier ones.

use crate::core::error::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace};

/// Default location of the services database
pub const DEFAULT_SERVICES_PATH: &str = "/etc/services";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTable {
    ports: HashMap<String, u16>,
}

impl ServiceTable {
    /// Parses a services database.
    ///
    /// Lines whose port field is not a number are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use melt::core::services::ServiceTable;
    ///
    /// let table = ServiceTable::parse("http 80/tcp www # WorldWideWeb\n");
    /// assert_eq!(table.lookup("http"), Some(80));
    /// assert_eq!(table.lookup("www"), Some(80));
    /// ```
    pub fn parse(content: &str) -> Self {
        let mut ports = HashMap::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.split_once('#').map_or(line, |(data, _)| data);
            let mut pieces: Vec<&str> = line.split_whitespace().collect();
            if pieces.len() < 2 {
                continue;
            }
            let port_field = pieces.remove(1);
            let number = port_field.split_once('/').map_or(port_field, |(n, _)| n);
            let Ok(port) = number.parse::<u16>() else {
                debug!("services line {}: ignoring port {:?}", lineno + 1, port_field);
                continue;
            };
            for name in pieces {
                ports.insert(name.to_string(), port);
            }
        }
        trace!("Loaded {} service names", ports.len());
        Self { ports }
    }

    /// Loads and parses a services database from disk.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading services from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn lookup(&self, name: &str) -> Option<u16> {
        self.ports.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u16)> for ServiceTable {
    fn from_iter<T: IntoIterator<Item = (S, u16)>>(iter: T) -> Self {
        Self {
            ports: iter.into_iter().map(|(name, port)| (name.into(), port)).collect(),
        }
    }
}
