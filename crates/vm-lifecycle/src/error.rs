//! Engine errors.
//!
//! Every error names the operation, the object identity (`namespace/name`)
//! and the underlying cause.

use kubevirt_client::KubeVirtError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Engine operation, used to label errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create or power on
    Start,
    /// Power off
    Stop,
    /// Remove the VM and its overflow Secret
    Delete,
    /// Report the remote object
    Read,
    /// Adopt an existing object by ID
    Import,
    /// Compute a change plan without writing
    Plan,
    /// Move an existing object to a new desired state
    Update,
}

impl Operation {
    /// Lowercase name used in error documents and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
            Self::Read => "read",
            Self::Import => "import",
            Self::Plan => "plan",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the lifecycle engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed identity or missing required fields; no remote call was made
    #[error("{operation} {identity}: validation failed: {message}")]
    Validation {
        operation: Operation,
        identity: String,
        message: String,
    },

    /// Target object does not exist
    #[error("{operation} {identity}: not found: {message}")]
    NotFound {
        operation: Operation,
        identity: String,
        message: String,
    },

    /// Stale resourceVersion or a concurrent create
    #[error("{operation} {identity}: conflict: {message}")]
    Conflict {
        operation: Operation,
        identity: String,
        message: String,
    },

    /// Transport, authentication, server failure or timeout
    #[error("{operation} {identity}: remote unavailable: {message}")]
    RemoteUnavailable {
        operation: Operation,
        identity: String,
        message: String,
    },

    /// Overflow Secret exists but the VirtualMachine create failed
    #[error("{operation} {identity}: secret {secret} created but VirtualMachine create failed: {message}")]
    PartialCreation {
        operation: Operation,
        identity: String,
        secret: String,
        message: String,
    },
}

impl EngineError {
    /// Classify a gateway error
    pub fn from_gateway(operation: Operation, identity: impl Into<String>, err: KubeVirtError) -> Self {
        let identity = identity.into();
        let message = err.to_string();
        match err {
            KubeVirtError::NotFound(_) => Self::NotFound {
                operation,
                identity,
                message,
            },
            KubeVirtError::Conflict(_) | KubeVirtError::AlreadyExists(_) => Self::Conflict {
                operation,
                identity,
                message,
            },
            KubeVirtError::Kube(_)
            | KubeVirtError::Serialization(_)
            | KubeVirtError::InvalidObject(_)
            | KubeVirtError::Api(_) => Self::RemoteUnavailable {
                operation,
                identity,
                message,
            },
        }
    }

    /// Validation failure
    pub fn validation(operation: Operation, identity: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Validation {
            operation,
            identity: identity.into(),
            message: message.to_string(),
        }
    }

    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::RemoteUnavailable { .. } => "remote_unavailable",
            Self::PartialCreation { .. } => "partial_creation",
        }
    }

    /// Operation that failed
    pub fn operation(&self) -> Operation {
        match self {
            Self::Validation { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Conflict { operation, .. }
            | Self::RemoteUnavailable { operation, .. }
            | Self::PartialCreation { operation, .. } => *operation,
        }
    }

    /// `namespace/name` of the object the operation targeted
    pub fn identity(&self) -> &str {
        match self {
            Self::Validation { identity, .. }
            | Self::NotFound { identity, .. }
            | Self::Conflict { identity, .. }
            | Self::RemoteUnavailable { identity, .. }
            | Self::PartialCreation { identity, .. } => identity,
        }
    }

    /// Underlying cause
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::RemoteUnavailable { message, .. }
            | Self::PartialCreation { message, .. } => message,
        }
    }

    /// Structured error document for the caller
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "kind": self.kind(),
                "operation": self.operation().as_str(),
                "identity": self.identity(),
                "message": self.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_are_classified() {
        let err = EngineError::from_gateway(Operation::Stop, "ns/w1", KubeVirtError::Conflict("stale".into()));
        assert_eq!(err.kind(), "conflict");
        assert_eq!(err.operation(), Operation::Stop);
        assert_eq!(err.identity(), "ns/w1");
        assert!(err.message().contains("stale"));

        let err = EngineError::from_gateway(Operation::Read, "ns/w1", KubeVirtError::Api("refused".into()));
        assert_eq!(err.kind(), "remote_unavailable");
    }

    #[test]
    fn test_error_document_shape() {
        let err = EngineError::validation(Operation::Start, "ns/Bad", "invalid name");
        let doc = err.to_document();
        assert_eq!(doc["error"]["kind"], "validation");
        assert_eq!(doc["error"]["operation"], "start");
        assert_eq!(doc["error"]["identity"], "ns/Bad");
        assert!(doc["error"]["message"].as_str().unwrap().contains("invalid name"));
    }
}
