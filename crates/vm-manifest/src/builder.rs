//! Manifest builder: desired state to VirtualMachine manifest.
//!
//! Pure and total. Optional sections are grafted only when the desired
//! state carries them; list order always mirrors input order.

use crate::cloud_init::{
    CLOUD_INIT_VOLUME, CloudInitPlacement, DEFAULT_AGENT_URL, INLINE_USERDATA_LIMIT, OverflowSecret,
    render_user_data,
};
use crate::node::ManifestNode;
use crate::object::RemoteObject;
use std::collections::BTreeMap;
use tracing::debug;
use vm_spec::{
    Affinity, DesiredSpec, DeviceCategory, DeviceRequest, MatchExpression, NetworkInterface, ObjectKey,
    TolerationRule, TransitionRequest,
};

/// Label carrying the managed tag on VMs and overflow Secrets
pub const APP_LABEL: &str = "app";

/// Label naming the VM on its pod template and overflow Secret
pub const VM_NAME_LABEL: &str = "kubevirt.io/vm";

/// Annotation listing hook sidecars
pub const HOOK_SIDECARS_ANNOTATION: &str = "hooks.kubevirt.io/hookSidecars";

/// Name of the primary disk and its container-disk volume
pub const CONTAINER_DISK: &str = "containerdisk";

const DEFAULT_INTERFACE: &str = "default";
const DISK_BUS: &str = "virtio";
const HOOK_PATH: &str = "/usr/bin/onDefineDomain";
const HOOK_API_VERSION: &str = "v1alpha2";

/// Build-time settings that come from engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Value of the `app` label
    pub managed_tag: String,
    /// Prefix of the overflow Secret name
    pub secret_prefix: String,
    /// Largest inline user data, in bytes
    pub inline_limit: usize,
    /// Agent endpoint written into the bootstrap script
    pub agent_url: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            managed_tag: "kubevirt-vm".to_string(),
            secret_prefix: "coder".to_string(),
            inline_limit: INLINE_USERDATA_LIMIT,
            agent_url: DEFAULT_AGENT_URL.to_string(),
        }
    }
}

/// Result of a build: the VM manifest and where its user data went
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltManifest {
    /// The VirtualMachine manifest
    pub object: RemoteObject,
    /// Cloud-init placement, when the desired state carries user data
    pub cloud_init: Option<CloudInitPlacement>,
}

impl BuiltManifest {
    /// Secret that must exist before the VM is created
    pub fn overflow_secret(&self) -> Option<&OverflowSecret> {
        self.cloud_init.as_ref().and_then(CloudInitPlacement::secret)
    }
}

/// Build the VirtualMachine manifest for `spec` under `key`.
///
/// `spec.running` is true only for a `start` request.
pub fn build(spec: &DesiredSpec, key: &ObjectKey, options: &BuildOptions) -> BuiltManifest {
    let running = matches!(spec.transition, Some(TransitionRequest::Start));

    let mut template_spec = ManifestNode::object([
        ("domain", domain(spec)),
        (
            "volumes",
            ManifestNode::Array(vec![ManifestNode::object([
                ("name", ManifestNode::from(CONTAINER_DISK)),
                (
                    "containerDisk",
                    ManifestNode::object([("image", ManifestNode::from(spec.image.as_str()))]),
                ),
            ])]),
        ),
        ("networks", ManifestNode::Array(networks(&spec.network_interfaces))),
    ]);
    scheduling(spec, &mut template_spec);

    let cloud_init = spec.cloud_init.as_deref().map(|payload| {
        let user_data = render_user_data(payload, spec.agent_token.as_ref(), &options.agent_url);
        CloudInitPlacement::decide(
            user_data,
            key,
            &options.secret_prefix,
            options.inline_limit,
            secret_labels(key, &options.managed_tag),
        )
    });
    if let Some(placement) = &cloud_init {
        match placement {
            CloudInitPlacement::Inline(user_data) => {
                debug!("cloud-init for {} inline ({} bytes)", key, user_data.len());
            }
            CloudInitPlacement::Secret(secret) => {
                debug!(
                    "cloud-init for {} stored in Secret {} ({} encoded bytes)",
                    key,
                    secret.key,
                    secret.encoded.len()
                );
            }
        }
        template_spec.push_at(&["volumes"], placement.volume());
        template_spec.push_at(&["domain", "devices", "disks"], disk(CLOUD_INIT_VOLUME));
    }

    let mut template_metadata = ManifestNode::object([(
        "labels",
        ManifestNode::object([(VM_NAME_LABEL, ManifestNode::from(key.name.as_str()))]),
    )]);
    if let Some(hook) = spec.sidecar_hook.as_deref().filter(|h| !h.is_empty()) {
        template_metadata.set_path(
            &["annotations", HOOK_SIDECARS_ANNOTATION],
            ManifestNode::from(hook_sidecars(hook)),
        );
    }

    let mut object = RemoteObject::virtual_machine(key);
    object
        .metadata
        .labels
        .insert(APP_LABEL.to_string(), options.managed_tag.clone());
    object.fields.insert(
        "spec".to_string(),
        ManifestNode::object([
            ("running", ManifestNode::from(running)),
            (
                "template",
                ManifestNode::object([("metadata", template_metadata), ("spec", template_spec)]),
            ),
        ]),
    );

    BuiltManifest { object, cloud_init }
}

/// Labels put on the overflow Secret of `key`
pub fn secret_labels(key: &ObjectKey, managed_tag: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), managed_tag.to_string()),
        (VM_NAME_LABEL.to_string(), key.name.clone()),
    ])
}

fn domain(spec: &DesiredSpec) -> ManifestNode {
    let mut domain = ManifestNode::object([
        ("devices", devices(spec)),
        ("resources", resources(spec)),
    ]);
    if let Some(machine_type) = non_empty(&spec.machine_type) {
        domain.set_path(&["machine", "type"], machine_type.into());
    }
    if let Some(architecture) = non_empty(&spec.architecture) {
        domain.set_path(&["cpu", "architecture"], architecture.into());
    }
    domain
}

fn resources(spec: &DesiredSpec) -> ManifestNode {
    let mut resources = ManifestNode::object([(
        "requests",
        ManifestNode::object([
            ("memory", ManifestNode::from(spec.memory.as_str())),
            ("cpu", ManifestNode::from(spec.cpu)),
        ]),
    )]);
    if let Some(size) = non_empty(&spec.hugepages) {
        let class = format!("hugepages-{size}");
        resources.set_path(&["requests", class.as_str()], size.into());
        resources.set_path(&["limits", class.as_str()], size.into());
    }
    resources
}

fn devices(spec: &DesiredSpec) -> ManifestNode {
    let mut devices = ManifestNode::object([
        ("disks", ManifestNode::Array(vec![disk(CONTAINER_DISK)])),
        ("interfaces", ManifestNode::Array(interfaces(&spec.network_interfaces))),
    ]);

    let host_devices: Vec<ManifestNode> = [
        (&spec.host_devices, DeviceCategory::Host),
        (&spec.pci_devices, DeviceCategory::Pci),
        (&spec.gpu_devices, DeviceCategory::Gpu),
    ]
    .into_iter()
    .flat_map(|(requests, category)| {
        requests
            .iter()
            .enumerate()
            .map(move |(index, request)| host_device(request, category, index))
    })
    .collect();
    if !host_devices.is_empty() {
        devices.set_path(&["hostDevices"], ManifestNode::Array(host_devices));
    }

    if !spec.usb_devices.is_empty() {
        let usb = spec
            .usb_devices
            .iter()
            .enumerate()
            .map(|(index, request)| usb_device(request, index))
            .collect();
        devices.set_path(&["usb"], ManifestNode::Array(usb));
    }
    devices
}

fn disk(name: &str) -> ManifestNode {
    ManifestNode::object([
        ("name", ManifestNode::from(name)),
        ("disk", ManifestNode::object([("bus", ManifestNode::from(DISK_BUS))])),
    ])
}

fn interfaces(requested: &[NetworkInterface]) -> Vec<ManifestNode> {
    if requested.is_empty() {
        return vec![bridge_interface(DEFAULT_INTERFACE)];
    }
    requested.iter().map(|iface| bridge_interface(&iface.name)).collect()
}

fn bridge_interface(name: &str) -> ManifestNode {
    ManifestNode::object([
        ("name", ManifestNode::from(name)),
        ("bridge", ManifestNode::empty_object()),
    ])
}

fn networks(requested: &[NetworkInterface]) -> Vec<ManifestNode> {
    if requested.is_empty() {
        return vec![ManifestNode::object([
            ("name", ManifestNode::from(DEFAULT_INTERFACE)),
            ("pod", ManifestNode::empty_object()),
        ])];
    }
    requested
        .iter()
        .map(|iface| {
            let source = if iface.is_pod_network() {
                ("pod", ManifestNode::empty_object())
            } else {
                (
                    "multus",
                    ManifestNode::object([("networkName", ManifestNode::from(iface.network_name.as_str()))]),
                )
            };
            ManifestNode::object([("name", ManifestNode::from(iface.name.as_str())), source])
        })
        .collect()
}

fn host_device(request: &DeviceRequest, category: DeviceCategory, index: usize) -> ManifestNode {
    let mut entry = ManifestNode::object([
        ("name", ManifestNode::from(request.resolved_name(category, index))),
        ("deviceName", ManifestNode::from(request.device_name.as_str())),
    ]);
    if let Some(vendor) = non_empty(&request.vendor_id) {
        entry.set_path(&["vendorId"], vendor.into());
    }
    if let Some(product) = non_empty(&request.product_id) {
        entry.set_path(&["productId"], product.into());
    }
    entry
}

fn usb_device(request: &DeviceRequest, index: usize) -> ManifestNode {
    let mut entry = ManifestNode::object([
        ("name", ManifestNode::from(request.resolved_name(DeviceCategory::Usb, index))),
        ("deviceName", ManifestNode::from(request.device_name.as_str())),
    ]);
    if let Some(vendor) = non_empty(&request.vendor_id) {
        entry.set_path(&["vendor"], vendor.into());
    }
    if let Some(product) = non_empty(&request.product_id) {
        entry.set_path(&["product"], product.into());
    }
    entry
}

fn scheduling(spec: &DesiredSpec, template_spec: &mut ManifestNode) {
    if !spec.node_selector.is_empty() {
        template_spec.set_path(&["nodeSelector"], ManifestNode::from(&spec.node_selector));
    }
    if !spec.tolerations.is_empty() {
        let tolerations = spec.tolerations.iter().map(toleration).collect();
        template_spec.set_path(&["tolerations"], ManifestNode::Array(tolerations));
    }
    if let Some(affinity) = spec.affinity.as_ref().filter(|a| !a.is_empty()) {
        template_spec.set_path(&["affinity"], affinity_node(affinity));
    }
}

fn toleration(rule: &TolerationRule) -> ManifestNode {
    let mut entry = ManifestNode::object([
        ("key", ManifestNode::from(rule.key.as_str())),
        ("operator", ManifestNode::from(rule.operator.as_str())),
        ("effect", ManifestNode::from(rule.effect.as_str())),
    ]);
    if let Some(value) = &rule.value {
        entry.set_path(&["value"], value.as_str().into());
    }
    entry
}

fn affinity_node(affinity: &Affinity) -> ManifestNode {
    const REQUIRED: &str = "requiredDuringSchedulingIgnoredDuringExecution";
    let mut node = ManifestNode::empty_object();

    if let Some(node_affinity) = affinity.node_affinity.as_ref().filter(|n| !n.required.is_empty()) {
        let terms = node_affinity
            .required
            .iter()
            .map(|term| ManifestNode::object([("matchExpressions", match_expressions(&term.match_expressions))]))
            .collect();
        node.set_path(
            &["nodeAffinity", REQUIRED, "nodeSelectorTerms"],
            ManifestNode::Array(terms),
        );
    }

    if let Some(pod_affinity) = affinity.pod_affinity.as_ref().filter(|p| !p.required.is_empty()) {
        let terms = pod_affinity
            .required
            .iter()
            .map(|term| {
                let mut entry = ManifestNode::object([
                    (
                        "labelSelector",
                        ManifestNode::object([("matchExpressions", match_expressions(&term.match_expressions))]),
                    ),
                    ("topologyKey", ManifestNode::from(term.topology_key.as_str())),
                ]);
                if !term.namespaces.is_empty() {
                    let namespaces = term.namespaces.iter().map(|ns| ManifestNode::from(ns.as_str())).collect();
                    entry.set_path(&["namespaces"], ManifestNode::Array(namespaces));
                }
                entry
            })
            .collect();
        node.set_path(&["podAffinity", REQUIRED], ManifestNode::Array(terms));
    }
    node
}

fn match_expressions(expressions: &[MatchExpression]) -> ManifestNode {
    ManifestNode::Array(
        expressions
            .iter()
            .map(|expr| {
                let mut entry = ManifestNode::object([
                    ("key", ManifestNode::from(expr.key.as_str())),
                    ("operator", ManifestNode::from(expr.operator.as_str())),
                ]);
                if !expr.values.is_empty() {
                    let values = expr.values.iter().map(|v| ManifestNode::from(v.as_str())).collect();
                    entry.set_path(&["values"], ManifestNode::Array(values));
                }
                entry
            })
            .collect(),
    )
}

/// JSON-encoded single-element hook sidecar list
fn hook_sidecars(hook: &str) -> String {
    serde_json::json!([{
        "args": ["--version", HOOK_API_VERSION],
        "configMap": {
            "hookPath": HOOK_PATH,
            "key": format!("{hook}.py"),
            "name": hook,
        }
    }])
    .to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
