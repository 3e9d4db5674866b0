//! KubeVirtClient trait for mocking
//!
//! The engine talks to the cluster only through this trait, so tests can
//! swap in the in-memory mock.

use crate::error::KubeVirtError;
use vm_manifest::{OverflowSecret, RemoteObject};
use vm_spec::ObjectKey;

/// Gateway to VirtualMachines and their overflow Secrets.
///
/// All calls distinguish `NotFound` from other failures. Updates must carry
/// the resourceVersion of the most recent read; a stale version fails with
/// `Conflict` and is not retried here.
#[async_trait::async_trait]
pub trait KubeVirtClientTrait: Send + Sync {
    /// Fetch a VirtualMachine
    async fn get_vm(&self, key: &ObjectKey) -> Result<RemoteObject, KubeVirtError>;

    /// Create a VirtualMachine; returns the stored object
    async fn create_vm(&self, manifest: &RemoteObject) -> Result<RemoteObject, KubeVirtError>;

    /// Replace a VirtualMachine; returns the stored object
    async fn update_vm(&self, manifest: &RemoteObject) -> Result<RemoteObject, KubeVirtError>;

    /// Delete a VirtualMachine
    async fn delete_vm(&self, key: &ObjectKey) -> Result<(), KubeVirtError>;

    /// Create an overflow Secret
    async fn create_secret(&self, secret: &OverflowSecret) -> Result<(), KubeVirtError>;

    /// Delete a Secret
    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), KubeVirtError>;
}
