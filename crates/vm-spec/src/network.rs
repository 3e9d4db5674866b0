//! Network interface requests

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Network name that selects the pod network instead of a Multus attachment
pub const POD_NETWORK: &str = "pod";

/// One VM network interface and the network it attaches to.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NetworkInterface {
    /// Interface name (also the network entry name)
    pub name: String,

    /// Network to attach: `pod`, or a NetworkAttachmentDefinition name
    pub network_name: String,
}

impl NetworkInterface {
    /// Create an interface on the given network
    pub fn new(name: impl Into<String>, network_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network_name: network_name.into(),
        }
    }

    /// Whether this interface attaches to the pod network
    pub fn is_pod_network(&self) -> bool {
        self.network_name == POD_NETWORK
    }
}
