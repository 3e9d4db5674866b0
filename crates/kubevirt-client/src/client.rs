//! KubeVirt client over the Kubernetes API

use crate::error::KubeVirtError;
use crate::kubevirt_trait::KubeVirtClientTrait;
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, PostParams};
use tracing::{debug, info};
use vm_manifest::{OverflowSecret, RemoteObject};
use vm_spec::ObjectKey;

const KUBEVIRT_GROUP: &str = "kubevirt.io";
const KUBEVIRT_VERSION: &str = "v1";
const VM_KIND: &str = "VirtualMachine";
const VM_PLURAL: &str = "virtualmachines";

/// Client for KubeVirt VirtualMachines and core Secrets
#[derive(Clone)]
pub struct KubeVirtClient {
    client: Client,
    vm_resource: ApiResource,
}

impl KubeVirtClient {
    /// Wrap an existing Kubernetes client
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk(KUBEVIRT_GROUP, KUBEVIRT_VERSION, VM_KIND);
        Self {
            client,
            vm_resource: ApiResource::from_gvk_with_plural(&gvk, VM_PLURAL),
        }
    }

    /// Connect using kubeconfig or the in-cluster service account
    pub async fn try_default() -> Result<Self, KubeVirtError> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn vms(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.vm_resource)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn to_dynamic(object: &RemoteObject) -> Result<DynamicObject, KubeVirtError> {
    Ok(serde_json::from_value(object.to_json()?)?)
}

fn from_dynamic(object: &DynamicObject) -> Result<RemoteObject, KubeVirtError> {
    Ok(RemoteObject::from_json(serde_json::to_value(object)?)?)
}

fn to_secret(secret: &OverflowSecret) -> Result<Secret, KubeVirtError> {
    Ok(serde_json::from_value(secret.to_remote_object().to_json()?)?)
}

#[async_trait::async_trait]
impl KubeVirtClientTrait for KubeVirtClient {
    async fn get_vm(&self, key: &ObjectKey) -> Result<RemoteObject, KubeVirtError> {
        debug!("Getting VirtualMachine {}/{}", key.namespace, key.name);
        let object = self
            .vms(&key.namespace)
            .get(&key.name)
            .await
            .map_err(KubeVirtError::from_kube)?;
        from_dynamic(&object)
    }

    async fn create_vm(&self, manifest: &RemoteObject) -> Result<RemoteObject, KubeVirtError> {
        let key = manifest.key();
        info!("Creating VirtualMachine {}/{}", key.namespace, key.name);
        let object = self
            .vms(&key.namespace)
            .create(&PostParams::default(), &to_dynamic(manifest)?)
            .await
            .map_err(KubeVirtError::from_kube)?;
        from_dynamic(&object)
    }

    async fn update_vm(&self, manifest: &RemoteObject) -> Result<RemoteObject, KubeVirtError> {
        let key = manifest.key();
        info!(
            "Updating VirtualMachine {}/{} (resourceVersion {})",
            key.namespace,
            key.name,
            manifest.metadata.resource_version.as_deref().unwrap_or("<none>")
        );
        let object = self
            .vms(&key.namespace)
            .replace(&key.name, &PostParams::default(), &to_dynamic(manifest)?)
            .await
            .map_err(KubeVirtError::from_kube)?;
        from_dynamic(&object)
    }

    async fn delete_vm(&self, key: &ObjectKey) -> Result<(), KubeVirtError> {
        info!("Deleting VirtualMachine {}/{}", key.namespace, key.name);
        self.vms(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
            .map_err(KubeVirtError::from_kube)?;
        Ok(())
    }

    async fn create_secret(&self, secret: &OverflowSecret) -> Result<(), KubeVirtError> {
        info!(
            "Creating Secret {}/{} ({} encoded bytes)",
            secret.key.namespace,
            secret.key.name,
            secret.encoded.len()
        );
        self.secrets(&secret.key.namespace)
            .create(&PostParams::default(), &to_secret(secret)?)
            .await
            .map_err(KubeVirtError::from_kube)?;
        Ok(())
    }

    async fn delete_secret(&self, key: &ObjectKey) -> Result<(), KubeVirtError> {
        info!("Deleting Secret {}/{}", key.namespace, key.name);
        self.secrets(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
            .map_err(KubeVirtError::from_kube)?;
        Ok(())
    }
}
