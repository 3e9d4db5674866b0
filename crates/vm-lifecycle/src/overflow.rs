//! Overflow Secret I/O: make sure the Secret exists before the VM that
//! references it, and remove it with the VM.

use crate::timeout::bounded;
use kubevirt_client::{KubeVirtClientTrait, KubeVirtError};
use std::time::Duration;
use tracing::{debug, info, warn};
use vm_manifest::OverflowSecret;
use vm_manifest::cloud_init::overflow_secret_name;
use vm_spec::ObjectKey;

/// How `ensure_overflow_secret` satisfied the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SecretOutcome {
    Created,
    Reused,
}

/// Create the Secret; an existing Secret counts as success.
///
/// An existing Secret's payload is neither compared nor replaced, so a
/// changed cloud-init under the same VM name keeps serving the old data.
pub(crate) async fn ensure_overflow_secret(
    client: &dyn KubeVirtClientTrait,
    secret: &OverflowSecret,
    budget: Duration,
) -> Result<SecretOutcome, KubeVirtError> {
    match bounded(budget, client.create_secret(secret)).await {
        Ok(()) => {
            info!(
                "Created Secret {} for cloud-init ({} encoded bytes)",
                secret.key,
                secret.encoded.len()
            );
            Ok(SecretOutcome::Created)
        }
        Err(e) if e.is_already_exists() => {
            warn!(
                "Secret {} already exists; reusing it without comparing its payload",
                secret.key
            );
            Ok(SecretOutcome::Reused)
        }
        Err(e) => Err(e),
    }
}

/// Delete the deterministic overflow Secret of `vm`; absence is success
pub(crate) async fn remove_overflow_secret(
    client: &dyn KubeVirtClientTrait,
    vm: &ObjectKey,
    secret_prefix: &str,
    budget: Duration,
) -> Result<(), KubeVirtError> {
    let key = ObjectKey::new(&vm.namespace, overflow_secret_name(secret_prefix, &vm.name));
    match bounded(budget, client.delete_secret(&key)).await {
        Ok(()) => {
            info!("Deleted Secret {}", key);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!("Secret {} not present", key);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
