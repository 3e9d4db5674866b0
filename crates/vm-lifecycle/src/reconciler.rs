//! State reconciler: projects a remote object into the caller's status
//! record. Never fails; missing remote fields leave status fields unset.

use vm_manifest::RemoteObject;
use vm_spec::{ObjectKey, TransitionRequest, TransitionState, VmStatus};

/// Status after an operation that left `state`, using `remote` (the object
/// the last gateway call returned) for timestamps and versions.
pub fn project(
    key: &ObjectKey,
    state: TransitionState,
    transition: Option<TransitionRequest>,
    remote: Option<&RemoteObject>,
) -> VmStatus {
    let mut status = VmStatus::new(key, state);
    status.transition = transition;
    if let Some(remote) = remote {
        status.creation_timestamp = remote.metadata.creation_timestamp;
        status.resource_version = remote.metadata.resource_version.clone();
        status.printable_status = remote.printable_status().map(str::to_string);
    }
    status
}

/// Lifecycle state implied by an existing remote object's run flag
pub fn observed_state(remote: &RemoteObject) -> TransitionState {
    if remote.wants_running() {
        TransitionState::Running
    } else {
        TransitionState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projection_copies_remote_details() {
        let remote = RemoteObject::from_json(json!({
            "apiVersion": "kubevirt.io/v1",
            "kind": "VirtualMachine",
            "metadata": {
                "name": "w1",
                "namespace": "ns",
                "resourceVersion": "9",
                "creationTimestamp": "2024-05-01T10:00:00Z"
            },
            "spec": {"running": true},
            "status": {"printableStatus": "Starting"}
        }))
        .unwrap();
        let key = remote.key();

        let status = project(&key, TransitionState::Running, Some(TransitionRequest::Start), Some(&remote));
        assert_eq!(status.id, "ns/w1");
        assert_eq!(status.vm_status, "Running");
        assert_eq!(status.resource_version.as_deref(), Some("9"));
        assert_eq!(status.printable_status.as_deref(), Some("Starting"));
        assert_eq!(
            status.creation_timestamp.map(|t| t.to_rfc3339()),
            Some("2024-05-01T10:00:00+00:00".to_string())
        );
        assert_eq!(observed_state(&remote), TransitionState::Running);
    }

    #[test]
    fn test_projection_without_remote_fields() {
        let key = ObjectKey::new("ns", "w1");
        let bare = RemoteObject::virtual_machine(&key);
        let status = project(&key, TransitionState::Stopped, None, Some(&bare));
        assert_eq!(status.creation_timestamp, None);
        assert_eq!(status.printable_status, None);
        assert_eq!(observed_state(&bare), TransitionState::Stopped);
    }
}
