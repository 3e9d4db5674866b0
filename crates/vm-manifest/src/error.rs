//! Manifest conversion errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    /// The document's top level is not a mapping
    #[error("Manifest is not a JSON object")]
    NotAnObject,

    /// A field required to build a `RemoteObject` is absent
    #[error("Manifest is missing field: {0}")]
    MissingField(&'static str),

    /// Conversion to or from JSON failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
