//! Desired configuration of one virtual machine.

use crate::affinity::Affinity;
use crate::device::DeviceRequest;
use crate::error::SpecError;
use crate::identity::ObjectKey;
use crate::network::NetworkInterface;
use crate::toleration::TolerationRule;
use crate::transition::{TransitionRequest, deserialize_transition};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Immutable per-call desired state of a VM.
///
/// `(namespace, name)` is the identity key. Neither may change once the VM
/// exists; a change means destroy-and-recreate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DesiredSpec {
    /// Name of the VirtualMachine
    pub name: String,

    /// Namespace; the engine's default namespace applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Container disk image reference
    pub image: String,

    /// Memory request (e.g. `2Gi`)
    pub memory: String,

    /// Number of CPU cores
    pub cpu: u32,

    /// QEMU machine type (e.g. `q35`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,

    /// CPU architecture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    /// Hugepage size (e.g. `2Mi`, `1Gi`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<String>,

    /// Sidecar hook ConfigMap name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar_hook: Option<String>,

    /// Node selector labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Tolerations in `key[=value]:effect` form
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Vec<String>")]
    pub tolerations: Vec<TolerationRule>,

    /// Scheduling affinity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Host devices to pass through
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_devices: Vec<DeviceRequest>,

    /// USB devices to pass through
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usb_devices: Vec<DeviceRequest>,

    /// PCI devices to pass through
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pci_devices: Vec<DeviceRequest>,

    /// GPUs to pass through
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpu_devices: Vec<DeviceRequest>,

    /// Network interfaces; a single bridged pod-network interface when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,

    /// Raw cloud-init user data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_init: Option<String>,

    /// Agent bootstrap token; wraps `cloud_init` in the bootstrap template
    #[serde(default, alias = "coder_agent_token", skip_serializing_if = "Option::is_none")]
    pub agent_token: Option<AgentToken>,

    /// Requested lifecycle transition
    #[serde(
        default,
        alias = "workspace_transition",
        deserialize_with = "deserialize_transition",
        skip_serializing_if = "Option::is_none"
    )]
    pub transition: Option<TransitionRequest>,
}

impl DesiredSpec {
    /// Minimal spec with the required fields set
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        memory: impl Into<String>,
        cpu: u32,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            memory: memory.into(),
            cpu,
            ..Default::default()
        }
    }

    /// Set the namespace
    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the transition request
    #[must_use]
    pub fn with_transition(mut self, transition: TransitionRequest) -> Self {
        self.transition = Some(transition);
        self
    }

    /// Identity key, resolving an absent namespace to `default_namespace`
    pub fn key(&self, default_namespace: &str) -> ObjectKey {
        let namespace = self
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default_namespace);
        ObjectKey::new(namespace, &self.name)
    }

    /// Check required fields and identity syntax.
    ///
    /// Optional fields are never validated here; malformed optional
    /// sub-fields degrade during the manifest build instead.
    pub fn validate(&self, default_namespace: &str) -> Result<(), SpecError> {
        self.key(default_namespace).validate()?;
        if self.image.trim().is_empty() {
            return Err(SpecError::MissingField("image"));
        }
        if self.memory.trim().is_empty() {
            return Err(SpecError::MissingField("memory"));
        }
        if self.cpu == 0 {
            return Err(SpecError::InvalidCpu(self.cpu));
        }
        Ok(())
    }
}

/// Agent bootstrap token. Redacted in `Debug` output.
#[derive(Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(transparent)]
pub struct AgentToken(String);

impl AgentToken {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AgentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentToken(<{} bytes>)", self.0.len())
    }
}
