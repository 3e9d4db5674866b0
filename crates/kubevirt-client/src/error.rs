//! KubeVirt client errors

use thiserror::Error;
use vm_manifest::ManifestError;

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum KubeVirtError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object already exists (create)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Stale resourceVersion (update)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transport, authentication or server error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object returned by or sent to the API is malformed
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// API rejected the request for another reason
    #[error("Kubernetes API error: {0}")]
    Api(String),
}

impl KubeVirtError {
    /// Classify an API status response.
    ///
    /// 404 is `NotFound`; 409 is `AlreadyExists` or `Conflict` depending on
    /// the reason. Other codes are not classified.
    pub fn from_status(code: u16, reason: &str, message: &str) -> Option<Self> {
        match (code, reason) {
            (404, _) => Some(Self::NotFound(message.to_string())),
            (409, "AlreadyExists") => Some(Self::AlreadyExists(message.to_string())),
            (409, _) => Some(Self::Conflict(message.to_string())),
            _ => None,
        }
    }

    /// Translate a kube error, classifying API status responses
    pub fn from_kube(err: kube::Error) -> Self {
        if let kube::Error::Api(response) = &err {
            if let Some(classified) = Self::from_status(response.code, &response.reason, &response.message) {
                return classified;
            }
        }
        Self::Kube(err)
    }

    /// Whether this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this is an already-exists error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<ManifestError> for KubeVirtError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Serialization(e) => Self::Serialization(e),
            other => Self::InvalidObject(other.to_string()),
        }
    }
}
