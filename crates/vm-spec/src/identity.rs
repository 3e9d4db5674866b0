//! Object identity: the (namespace, name) key of a remote object.

use crate::error::SpecError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity key of a namespaced remote object.
///
/// Rendered as `namespace/name`, which is also the caller-visible ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct ObjectKey {
    /// Kubernetes namespace
    pub namespace: String,

    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Create a key from its parts
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse an ID of the form `namespace/name`.
    ///
    /// Exactly one separator is allowed and neither part may be empty.
    pub fn parse(id: &str) -> Result<Self, SpecError> {
        let mut parts = id.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(SpecError::InvalidId(id.to_string())),
        }
    }

    /// Check the key against Kubernetes naming rules.
    ///
    /// Names are RFC 1123 subdomains of at most 63 characters, since the
    /// name is also written into label values. Namespaces are labels.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.is_empty() {
            return Err(SpecError::MissingField("name"));
        }
        if self.name.len() > LABEL_VALUE_MAX_LEN || !is_dns_subdomain(&self.name) {
            return Err(SpecError::InvalidName(self.name.clone()));
        }
        if !is_dns_label(&self.namespace) {
            return Err(SpecError::InvalidNamespace(self.namespace.clone()));
        }
        Ok(())
    }

    /// The caller-visible ID (`namespace/name`)
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Longest value Kubernetes accepts for a label
const LABEL_VALUE_MAX_LEN: usize = 63;

/// Check a string against the RFC 1123 label rules Kubernetes applies to
/// namespaces.
pub(crate) fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let valid_char = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-';
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    bytes.iter().all(valid_char) && bytes.first().is_some_and(alnum) && bytes.last().is_some_and(alnum)
}

/// RFC 1123 subdomain: dot-separated labels, at most 253 characters
pub(crate) fn is_dns_subdomain(value: &str) -> bool {
    !value.is_empty() && value.len() <= 253 && value.split('.').all(is_dns_label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_id() {
        let key = ObjectKey::parse("ns/w1").unwrap();
        assert_eq!(key.namespace, "ns");
        assert_eq!(key.name, "w1");
        assert_eq!(key.id(), "ns/w1");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for id in ["w1", "ns/", "/w1", "a/b/c", ""] {
            assert_eq!(
                ObjectKey::parse(id),
                Err(SpecError::InvalidId(id.to_string())),
                "{id} should be rejected"
            );
        }
    }

    #[test]
    fn test_dns_label_rules() {
        assert!(is_dns_label("w1"));
        assert!(is_dns_label("my-vm-01"));
        assert!(!is_dns_label("My-VM"));
        assert!(!is_dns_label("-leading"));
        assert!(!is_dns_label("trailing-"));
        assert!(!is_dns_label("has.dot"));
        assert!(!is_dns_label(&"a".repeat(64)));
    }

    #[test]
    fn test_dns_subdomain_rules() {
        assert!(is_dns_subdomain("w1"));
        assert!(is_dns_subdomain("web.team-a.example"));
        assert!(!is_dns_subdomain(""));
        assert!(!is_dns_subdomain("a..b"));
        assert!(!is_dns_subdomain(".leading"));
        assert!(!is_dns_subdomain("trailing."));
        assert!(!is_dns_subdomain("Upper.case"));
        assert!(!is_dns_subdomain(&vec!["a".repeat(63); 4].join(".")));
    }

    #[test]
    fn test_validate_key() {
        assert_eq!(ObjectKey::new("ns", "web.team-a").validate(), Ok(()));
        assert_eq!(ObjectKey::new("ns", "").validate(), Err(SpecError::MissingField("name")));
        assert!(matches!(
            ObjectKey::new("ns", "a.".repeat(32) + "a").validate(),
            Err(SpecError::InvalidName(_))
        ));
        assert!(matches!(
            ObjectKey::new("ns", "Bad_Name").validate(),
            Err(SpecError::InvalidName(_))
        ));
        assert!(matches!(
            ObjectKey::new("team.a", "w1").validate(),
            Err(SpecError::InvalidNamespace(_))
        ));
    }
}
