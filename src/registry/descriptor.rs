//! Service descriptors and their validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted service name.
pub const MAX_NAME_LEN: usize = 64;

/// Desired-state record for one dynamically registered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique key; also determines the route id.
    pub name: String,
    /// Host the route matches.
    pub domain: String,
    /// Dial address of the backend (e.g. "backend:3000").
    pub upstream: String,
}

/// Why a descriptor was refused at the registration boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("name, domain, and upstream are required (missing {0})")]
    Missing(&'static str),

    #[error("invalid name '{0}': use 1-64 ASCII letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("invalid domain '{0}'")]
    InvalidDomain(String),

    #[error("invalid upstream '{0}'")]
    InvalidUpstream(String),
}

impl ServiceDescriptor {
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        upstream: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            upstream: upstream.into(),
        }
    }

    /// Check the descriptor before any side effect happens.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::Missing("name"));
        }
        if self.domain.trim().is_empty() {
            return Err(DescriptorError::Missing("domain"));
        }
        if self.upstream.trim().is_empty() {
            return Err(DescriptorError::Missing("upstream"));
        }

        if !is_valid_name(&self.name) {
            return Err(DescriptorError::InvalidName(self.name.clone()));
        }
        if !is_valid_domain(&self.domain) {
            return Err(DescriptorError::InvalidDomain(self.domain.clone()));
        }
        if self.upstream.chars().any(char::is_whitespace) {
            return Err(DescriptorError::InvalidUpstream(self.upstream.clone()));
        }
        Ok(())
    }
}

/// Names end up in `svc-<name>` ids and in `/id/<id>` URL paths.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn is_valid_domain(domain: &str) -> bool {
    let host = domain.strip_prefix("*.").unwrap_or(domain);
    !host.is_empty()
        && !host
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '"' || c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_descriptor() {
        let svc = ServiceDescriptor::new("my-api_2", "api.example.com", "backend:3000");
        assert!(svc.validate().is_ok());

        let wildcard = ServiceDescriptor::new("wild", "*.example.com", "127.0.0.1:8080");
        assert!(wildcard.validate().is_ok());
    }

    #[test]
    fn test_missing_fields() {
        let svc = ServiceDescriptor::new("", "a.example", "b:1");
        assert_eq!(svc.validate(), Err(DescriptorError::Missing("name")));

        let svc = ServiceDescriptor::new("n", "  ", "b:1");
        assert_eq!(svc.validate(), Err(DescriptorError::Missing("domain")));

        let svc = ServiceDescriptor::new("n", "a.example", "");
        assert_eq!(svc.validate(), Err(DescriptorError::Missing("upstream")));
    }

    #[test]
    fn test_unsafe_names_rejected() {
        for name in ["a/b", "a b", "svc.name", "ü", "x?y=1"] {
            let svc = ServiceDescriptor::new(name, "a.example", "b:1");
            assert!(
                matches!(svc.validate(), Err(DescriptorError::InvalidName(_))),
                "{name} should be rejected"
            );
        }

        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(!is_valid_name(&long));
        assert!(is_valid_name(&"a".repeat(MAX_NAME_LEN)));
    }

    #[test]
    fn test_bad_domain_and_upstream() {
        let svc = ServiceDescriptor::new("n", "a.example/path", "b:1");
        assert!(matches!(svc.validate(), Err(DescriptorError::InvalidDomain(_))));

        let svc = ServiceDescriptor::new("n", "a.*.example", "b:1");
        assert!(matches!(svc.validate(), Err(DescriptorError::InvalidDomain(_))));

        let svc = ServiceDescriptor::new("n", "a.example", "b :1");
        assert!(matches!(svc.validate(), Err(DescriptorError::InvalidUpstream(_))));
    }
}
