//! Input validation functions for melt
//!
//! Centralized checks for values that end up verbatim in generated rule text,
//! so a malformed intent cannot inject extra tokens into a ruleset.

/// Validates a single port number.
///
/// # Errors
///
/// Returns `Err` if port is 0 (reserved).
pub fn validate_port(port: u16) -> Result<u16, String> {
    if port == 0 {
        Err("Port must be between 1 and 65535".to_string())
    } else {
        Ok(port)
    }
}

/// Validates a port range.
///
/// # Errors
///
/// Returns `Err` if:
/// - Either port is 0
/// - Start port is greater than end port
pub fn validate_port_range(start: u16, end: u16) -> Result<(u16, u16), String> {
    validate_port(start)?;
    validate_port(end)?;

    if start > end {
        Err("Start port must be less than or equal to end port".to_string())
    } else {
        Ok((start, end))
    }
}

/// Parses a textual `lo:hi` port range.
///
/// Returns `None` if the text is not two digit runs separated by a colon.
///
/// # Examples
///
/// ```
/// use melt::validators::parse_port_range;
///
/// assert_eq!(parse_port_range("1024:65535"), Some(Ok((1024, 65535))));
/// assert_eq!(parse_port_range("http"), None);
/// assert!(parse_port_range("90:80").unwrap().is_err());
/// ```
pub fn parse_port_range(text: &str) -> Option<Result<(u16, u16), String>> {
    let (lo, hi) = text.split_once(':')?;
    if !is_digits(lo) || !is_digits(hi) {
        return None;
    }
    let parse = |s: &str| {
        s.parse::<u16>()
            .map_err(|_| format!("Port {s} is out of range (max 65535)"))
    };
    Some(parse(lo).and_then(|lo| validate_port_range(lo, parse(hi)?)))
}

/// Returns `true` if `text` is a non-empty run of ASCII digits.
pub fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Validates a network interface name.
///
/// Linux kernel interface name rules:
/// - Max 15 characters (IFNAMSIZ - 1)
/// - Alphanumeric, dot, dash, underscore only (plus `+` wildcard suffix)
/// - Cannot be "." or ".."
///
/// # Errors
///
/// Returns `Err` if interface name violates kernel constraints.
pub fn validate_interface(name: &str) -> Result<String, String> {
    if name.is_empty() {
        return Err("Interface name cannot be empty".to_string());
    }

    if name.len() > 15 {
        return Err("Interface name too long (max 15 characters)".to_string());
    }

    if name == "." || name == ".." {
        return Err("Invalid interface name".to_string());
    }

    // iptables accepts a trailing '+' as a prefix wildcard (ppp+)
    let stem = name.strip_suffix('+').unwrap_or(name);
    if !stem
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err("Interface name contains invalid characters".to_string());
    }

    Ok(name.to_string())
}
