//! Validation errors for desired-state records

use thiserror::Error;

/// Errors raised while validating a desired spec, before any remote call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    /// A required field is empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Name is not a valid DNS-1123 label
    #[error("invalid name '{0}': must be a lowercase RFC 1123 subdomain of at most 63 characters")]
    InvalidName(String),

    /// Namespace is not a valid DNS-1123 label
    #[error("invalid namespace '{0}': must be a lowercase RFC 1123 label of at most 63 characters")]
    InvalidNamespace(String),

    /// CPU count must be positive
    #[error("invalid cpu count {0}: must be at least 1")]
    InvalidCpu(u32),

    /// Identifier is not of the form namespace/name
    #[error("invalid ID format: {0}, expected namespace/name")]
    InvalidId(String),
}
