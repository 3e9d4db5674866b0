//! Helper functions for building test objects

use vm_manifest::{ManifestNode, RemoteObject};
use vm_spec::ObjectKey;

/// A VirtualMachine as the cluster would return it: a small template plus
/// fields the platform defaults in.
pub fn create_test_vm(key: &ObjectKey, running: bool) -> RemoteObject {
    let mut object = RemoteObject::virtual_machine(key);
    object
        .metadata
        .labels
        .insert("app".to_string(), "kubevirt-vm".to_string());
    object.set_field(&["spec", "running"], ManifestNode::from(running));
    object.set_field(
        &["spec", "template", "metadata", "labels", "kubevirt.io/vm"],
        ManifestNode::from(key.name.as_str()),
    );
    object.set_field(
        &["spec", "template", "spec", "domain", "resources", "requests"],
        ManifestNode::object([
            ("memory", ManifestNode::from("2Gi")),
            ("cpu", ManifestNode::from(2_u32)),
        ]),
    );
    object.set_field(
        &["spec", "template", "spec", "domain", "machine", "type"],
        ManifestNode::from("q35"),
    );
    object.set_field(
        &["spec", "template", "spec", "volumes"],
        ManifestNode::Array(vec![ManifestNode::object([
            ("name", ManifestNode::from("containerdisk")),
            (
                "containerDisk",
                ManifestNode::object([("image", ManifestNode::from("img:latest"))]),
            ),
        ])]),
    );
    object
}
