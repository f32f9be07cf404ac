//! Validation helpers for deployment parameters.

use regex::Regex;
use std::sync::OnceLock;

/// Longest service name the platform accepts.
pub const SERVICE_NAME_MAX_LEN: usize = 63;

fn service_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("static pattern must compile")
    })
}

/// Whether a service name is a valid lowercase DNS label.
///
/// The platform requires names that start with a letter, contain only
/// lowercase letters, digits, and hyphens, do not end with a hyphen, and
/// fit in 63 characters.
#[must_use]
pub fn valid_service_name(name: &str) -> bool {
    name.len() <= SERVICE_NAME_MAX_LEN && service_name_pattern().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_catalog_names() {
        assert!(valid_service_name("proxy-node"));
        assert!(valid_service_name("consumer-node"));
        assert!(valid_service_name("chat-web-app"));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(!valid_service_name(""));
        assert!(!valid_service_name("Proxy-Node"));
        assert!(!valid_service_name("-leading-hyphen"));
        assert!(!valid_service_name("trailing-"));
        assert!(!valid_service_name("has_underscore"));
        assert!(!valid_service_name("9starts-with-digit"));
        assert!(!valid_service_name(&"a".repeat(64)));
    }

    #[test]
    fn accepts_max_length() {
        assert!(valid_service_name(&"a".repeat(63)));
    }
}
