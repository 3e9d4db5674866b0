//! Remote objects: the manifests exchanged with the platform API.

use crate::error::ManifestError;
use crate::node::ManifestNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vm_spec::ObjectKey;

/// API version of KubeVirt VirtualMachines
pub const VM_API_VERSION: &str = "kubevirt.io/v1";

/// Kind of KubeVirt VirtualMachines
pub const VM_KIND: &str = "VirtualMachine";

/// API version of core Secrets
pub const SECRET_API_VERSION: &str = "v1";

/// Kind of core Secrets
pub const SECRET_KIND: &str = "Secret";

/// Object metadata.
///
/// Fields the engine does not interpret (finalizers, owner references,
/// managed fields, ...) are kept in `extra` so a read-modify-write cycle
/// sends them back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// Object name
    pub name: String,

    /// Object namespace
    #[serde(default)]
    pub namespace: String,

    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Optimistic concurrency token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Server-assigned UID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Server-assigned creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Everything else
    #[serde(flatten)]
    pub extra: BTreeMap<String, ManifestNode>,
}

/// A remote object: type header, metadata and body sections
/// (`spec`, `status`, `data`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    /// `apiVersion`
    pub api_version: String,

    /// `kind`
    pub kind: String,

    /// `metadata`
    pub metadata: ObjectMetadata,

    /// Top-level sections other than the header and metadata
    pub fields: BTreeMap<String, ManifestNode>,
}

impl RemoteObject {
    /// An empty VirtualMachine with the given identity
    pub fn virtual_machine(key: &ObjectKey) -> Self {
        Self {
            api_version: VM_API_VERSION.to_string(),
            kind: VM_KIND.to_string(),
            metadata: ObjectMetadata {
                name: key.name.clone(),
                namespace: key.namespace.clone(),
                ..Default::default()
            },
            fields: BTreeMap::new(),
        }
    }

    /// Identity key
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Value at a dotted path below the top level, e.g. `["spec", "running"]`
    pub fn field(&self, path: &[&str]) -> Option<&ManifestNode> {
        let (first, rest) = path.split_first()?;
        self.fields.get(*first)?.get_path(rest)
    }

    /// Set a value below the top level, creating intermediate objects
    pub fn set_field(&mut self, path: &[&str], value: ManifestNode) {
        let Some((first, rest)) = path.split_first() else {
            return;
        };
        self.fields
            .entry((*first).to_string())
            .or_insert_with(ManifestNode::empty_object)
            .set_path(rest, value);
    }

    /// `spec.running`, when set
    pub fn running(&self) -> Option<bool> {
        self.field(&["spec", "running"]).and_then(ManifestNode::as_bool)
    }

    /// `spec.runStrategy`, when set
    pub fn run_strategy(&self) -> Option<&str> {
        self.field(&["spec", "runStrategy"]).and_then(ManifestNode::as_str)
    }

    /// Whether the VM is requested to run, from either `running` or
    /// `runStrategy`
    pub fn wants_running(&self) -> bool {
        match (self.running(), self.run_strategy()) {
            (Some(running), _) => running,
            (None, Some(strategy)) => strategy != "Halted",
            (None, None) => false,
        }
    }

    /// `status.printableStatus`, when reported
    pub fn printable_status(&self) -> Option<&str> {
        self.field(&["status", "printableStatus"]).and_then(ManifestNode::as_str)
    }

    /// Convert from the wire representation
    pub fn from_json(value: serde_json::Value) -> Result<Self, ManifestError> {
        let serde_json::Value::Object(mut map) = value else {
            return Err(ManifestError::NotAnObject);
        };
        let api_version = take_string(&mut map, "apiVersion")?;
        let kind = take_string(&mut map, "kind")?;
        let metadata = map.remove("metadata").ok_or(ManifestError::MissingField("metadata"))?;
        let metadata: ObjectMetadata = serde_json::from_value(metadata)?;
        let fields = map.into_iter().map(|(k, v)| (k, ManifestNode::from(v))).collect();
        Ok(Self {
            api_version,
            kind,
            metadata,
            fields,
        })
    }

    /// Convert to the wire representation
    pub fn to_json(&self) -> Result<serde_json::Value, ManifestError> {
        let mut map = serde_json::Map::new();
        map.insert("apiVersion".to_string(), self.api_version.clone().into());
        map.insert("kind".to_string(), self.kind.clone().into());
        map.insert("metadata".to_string(), serde_json::to_value(&self.metadata)?);
        for (key, node) in &self.fields {
            map.insert(key.clone(), serde_json::Value::from(node.clone()));
        }
        Ok(serde_json::Value::Object(map))
    }
}

fn take_string(map: &mut serde_json::Map<String, serde_json::Value>, key: &'static str) -> Result<String, ManifestError> {
    match map.remove(key) {
        Some(serde_json::Value::String(value)) => Ok(value),
        _ => Err(ManifestError::MissingField(key)),
    }
}
