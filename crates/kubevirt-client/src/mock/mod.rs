//! Mock KubeVirtClient for unit testing
//!
//! An in-memory, versioned object store implementing `KubeVirtClientTrait`:
//! - every mutation bumps a monotonically increasing resourceVersion
//! - creates stamp `creationTimestamp` and `uid`
//! - updates with a stale resourceVersion fail with `Conflict`
//! - duplicate creates fail with `AlreadyExists`
//!
//! Every trait call is recorded in a journal (`calls()`), and a one-shot
//! failure can be injected per call kind (`fail_next`).

pub mod helpers;

use crate::error::KubeVirtError;
use crate::kubevirt_trait::KubeVirtClientTrait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vm_manifest::{ManifestNode, OverflowSecret, RemoteObject};
use vm_spec::ObjectKey;

/// Kind of a gateway call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `get_vm`
    GetVm,
    /// `create_vm`
    CreateVm,
    /// `update_vm`
    UpdateVm,
    /// `delete_vm`
    DeleteVm,
    /// `create_secret`
    CreateSecret,
    /// `delete_secret`
    DeleteSecret,
}

/// One recorded gateway call with its argument
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// Read of the VM at this key
    GetVm(ObjectKey),
    /// Create of this VM object
    CreateVm(RemoteObject),
    /// Update sent with this object
    UpdateVm(RemoteObject),
    /// Delete of the VM at this key
    DeleteVm(ObjectKey),
    /// Create of this Secret
    CreateSecret(OverflowSecret),
    /// Delete of the Secret at this key
    DeleteSecret(ObjectKey),
}

impl MockCall {
    /// Kind of this call
    pub fn kind(&self) -> CallKind {
        match self {
            Self::GetVm(_) => CallKind::GetVm,
            Self::CreateVm(_) => CallKind::CreateVm,
            Self::UpdateVm(_) => CallKind::UpdateVm,
            Self::DeleteVm(_) => CallKind::DeleteVm,
            Self::CreateSecret(_) => CallKind::CreateSecret,
            Self::DeleteSecret(_) => CallKind::DeleteSecret,
        }
    }
}

/// Mock KubeVirtClient for testing
#[derive(Clone, Default)]
pub struct MockKubeVirtClient {
    pub(crate) vms: Arc<Mutex<HashMap<ObjectKey, RemoteObject>>>,
    pub(crate) secrets: Arc<Mutex<HashMap<ObjectKey, OverflowSecret>>>,
    pub(crate) calls: Arc<Mutex<Vec<MockCall>>>,
    pub(crate) failures: Arc<Mutex<HashMap<CallKind, KubeVirtError>>>,
    pub(crate) latency: Arc<Mutex<Option<Duration>>>,
    // Counter for resourceVersions and uids
    pub(crate) next_version: Arc<Mutex<u64>>,
}

impl MockKubeVirtClient {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a VM directly (for test setup); not journaled.
    ///
    /// Assigns a resourceVersion, and a creationTimestamp and uid when
    /// missing. Returns the stored object.
    pub fn add_vm(&self, mut object: RemoteObject) -> RemoteObject {
        self.stamp_new(&mut object);
        self.vms.lock().unwrap().insert(object.key(), object.clone());
        object
    }

    /// Store a Secret directly (for test setup); not journaled
    pub fn add_secret(&self, secret: OverflowSecret) {
        self.secrets.lock().unwrap().insert(secret.key.clone(), secret);
    }

    /// Current stored VM
    pub fn vm(&self, key: &ObjectKey) -> Option<RemoteObject> {
        self.vms.lock().unwrap().get(key).cloned()
    }

    /// Current stored Secret
    pub fn secret(&self, key: &ObjectKey) -> Option<OverflowSecret> {
        self.secrets.lock().unwrap().get(key).cloned()
    }

    /// Bump the stored VM's resourceVersion, simulating a concurrent writer
    pub fn touch_vm(&self, key: &ObjectKey) {
        let version = self.next_version();
        if let Some(object) = self.vms.lock().unwrap().get_mut(key) {
            object.metadata.resource_version = Some(version.to_string());
        }
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Kinds of all calls so far, in order
    pub fn call_kinds(&self) -> Vec<CallKind> {
        self.calls.lock().unwrap().iter().map(MockCall::kind).collect()
    }

    /// Number of calls of one kind
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.kind() == kind).count()
    }

    /// Forget recorded calls (store contents are kept)
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Fail the next call of `kind` with `error`
    pub fn fail_next(&self, kind: CallKind, error: KubeVirtError) {
        self.failures.lock().unwrap().insert(kind, error);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Generate next resourceVersion
    pub(crate) fn next_version(&self) -> u64 {
        let mut version = self.next_version.lock().unwrap();
        *version += 1;
        *version
    }

    async fn record(&self, call: MockCall) -> Result<(), KubeVirtError> {
        let kind = call.kind();
        self.calls.lock().unwrap().push(call);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.lock().unwrap().remove(&kind) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn stamp_new(&self, object: &mut RemoteObject) {
        let version = self.next_version();
        object.metadata.resource_version = Some(version.to_string());
        object.metadata.creation_timestamp.get_or_insert_with(Utc::now);
        object
            .metadata
            .uid
            .get_or_insert_with(|| format!("00000000-0000-0000-0000-{version:012}"));
        stamp_status(object);
    }
}

/// Emulate the controller's `status.printableStatus`
fn stamp_status(object: &mut RemoteObject) {
    let status = if object.wants_running() { "Running" } else { "Stopped" };
    object.set_field(&["status", "printableStatus"], ManifestNode::from(status));
}

#[async_trait::async_trait]
impl KubeVirtClientTrait for MockKubeVirtClient {
    async fn get_vm(&self, key: &ObjectKey) -> Result<RemoteObject, KubeVirtError> {
        self.record(MockCall::GetVm(key.clone())).await?;
        self.vms
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| KubeVirtError::NotFound(format!("VirtualMachine {key}")))
    }

    async fn create_vm(&self, manifest: &RemoteObject) -> Result<RemoteObject, KubeVirtError> {
        self.record(MockCall::CreateVm(manifest.clone())).await?;
        let key = manifest.key();
        if self.vms.lock().unwrap().contains_key(&key) {
            return Err(KubeVirtError::AlreadyExists(format!("VirtualMachine {key}")));
        }
        let mut object = manifest.clone();
        object.metadata.creation_timestamp = None;
        object.metadata.uid = None;
        self.stamp_new(&mut object);
        self.vms.lock().unwrap().insert(key, object.clone());
        Ok(object)
    }

    async fn update_vm(&self, manifest: &RemoteObject) -> Result<RemoteObject, KubeVirtError> {
        self.record(MockCall::UpdateVm(manifest.clone())).await?;
        let key = manifest.key();
        let version = self.next_version();
        let mut vms = self.vms.lock().unwrap();
        let Some(stored) = vms.get(&key) else {
            return Err(KubeVirtError::NotFound(format!("VirtualMachine {key}")));
        };
        if let Some(sent) = &manifest.metadata.resource_version {
            if stored.metadata.resource_version.as_ref() != Some(sent) {
                return Err(KubeVirtError::Conflict(format!(
                    "VirtualMachine {key}: resourceVersion {sent} is stale"
                )));
            }
        }
        let mut object = manifest.clone();
        object.metadata.resource_version = Some(version.to_string());
        object.metadata.creation_timestamp = stored.metadata.creation_timestamp;
        object.metadata.uid = stored.metadata.uid.clone();
        stamp_status(&mut object);
        vms.insert(key, object.clone());
        Ok(object)
    }

    async fn delete_vm(&self, key: &ObjectKey) -> Result<(), KubeVirtError> {
        self.record(MockCall::DeleteVm(key.clone())).await?;
        self.vms
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| KubeVirtError::NotFound(format!("VirtualMachine {key}")))
    }

    async fn create_secret(&self, secret: &OverflowSecret) -> Result<(), KubeVirtError> {
        self.record(MockCall::CreateSecret(secret.clone())).await?;
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&secret.key) {
            return Err(KubeVirtError::AlreadyExists(format!("Secret {}", secret.key)));
        }
        secrets.insert(secret.key.clone(), secret.clone());
        Ok(())
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), KubeVirtError> {
        self.record(MockCall::DeleteSecret(key.clone())).await?;
        self.secrets
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| KubeVirtError::NotFound(format!("Secret {key}")))
    }
}
