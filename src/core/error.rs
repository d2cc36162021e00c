use crate::core::firewall::AddressFamily;
use crate::core::profiles::ProfileError;
use thiserror::Error;

/// Core error types for melt
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A port name is not present in the services table
    #[error("unknown service \"{0}\"")]
    UnknownService(String),

    /// The address resolver could not resolve a host name
    #[error("cannot resolve \"{name}\": {message}")]
    Resolution { name: String, message: String },

    /// A rule implies two different address families
    #[error(transparent)]
    AddressFamilyConflict(#[from] AddressFamilyConflict),

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// Profile lookup or loading failed
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn resolution(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Resolution {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

/// Raised by [`Rule::new`](crate::core::firewall::Rule::new) when the fields of
/// a rule imply two different address families.
///
/// The rule factory treats this as an expected outcome of expansion and drops
/// the offending instance instead of failing the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("address family conflict: {first} vs {second}")]
pub struct AddressFamilyConflict {
    pub first: AddressFamily,
    pub second: AddressFamily,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_service_names_the_service() {
        let err = Error::UnknownService("gopherz".to_string());
        assert_eq!(err.to_string(), "unknown service \"gopherz\"");
    }

    #[test]
    fn test_conflict_is_transparent() {
        let err: Error = AddressFamilyConflict {
            first: AddressFamily::Inet,
            second: AddressFamily::Inet6,
        }
        .into();
        assert_eq!(err.to_string(), "address family conflict: inet vs inet6");
    }

    #[test]
    fn test_validation_message() {
        let err = Error::validation("to.port", "Port must be between 1 and 65535");
        assert!(err.to_string().contains("to.port"));
        assert!(err.to_string().contains("65535"));
    }
}
