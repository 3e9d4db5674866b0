//! Status record returned to the caller after every engine call.

use crate::identity::ObjectKey;
use crate::transition::{TransitionRequest, TransitionState};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Caller-visible projection of a VM.
///
/// The coarse `vm_status` comes from the transition the engine just
/// completed, not from a live health probe.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct VmStatus {
    /// `namespace/name`
    pub id: String,

    /// Namespace
    pub namespace: String,

    /// Name
    pub name: String,

    /// Lifecycle state after the call
    pub state: TransitionState,

    /// Coarse status string (`Created`, `Running`, `Stopped`, `Absent`)
    pub vm_status: String,

    /// Creation timestamp of the remote object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Resource version observed last
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Platform-reported status (`status.printableStatus`), when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printable_status: Option<String>,

    /// Last transition the engine completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionRequest>,
}

impl VmStatus {
    /// Status for an object with the given state and no remote details
    pub fn new(key: &ObjectKey, state: TransitionState) -> Self {
        Self {
            id: key.id(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            state,
            vm_status: state.vm_status().to_string(),
            creation_timestamp: None,
            resource_version: None,
            printable_status: None,
            transition: None,
        }
    }

    /// Identity key of the recorded object
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}
