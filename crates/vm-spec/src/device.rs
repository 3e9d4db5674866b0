//! Device passthrough requests (host, USB, PCI, GPU).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Device category; determines the generated default name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCategory {
    /// Generic host device
    Host,
    /// USB device
    Usb,
    /// PCI device
    Pci,
    /// GPU (rendered as a PCI host device)
    Gpu,
}

impl DeviceCategory {
    /// Prefix used for generated names (`<prefix>-<index>`)
    pub fn name_prefix(self) -> &'static str {
        match self {
            Self::Host => "hostdevice",
            Self::Usb => "usb",
            Self::Pci => "pci",
            Self::Gpu => "gpu",
        }
    }
}

/// A request to pass a host device through to the VM.
///
/// Accepts either the full record or a bare device-name string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(from = "DeviceRequestRepr")]
pub struct DeviceRequest {
    /// Device name inside the VM; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Resource name of the device on the host
    pub device_name: String,

    /// Vendor ID (hex, e.g. `10de` for NVIDIA)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,

    /// Product ID (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

impl DeviceRequest {
    /// Request a device by host resource name only
    pub fn named(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Default::default()
        }
    }

    /// Name to emit: the explicit name, or `<category>-<index>`
    pub fn resolved_name(&self, category: DeviceCategory, index: usize) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}-{}", category.name_prefix(), index),
        }
    }
}

#[derive(Deserialize, JsonSchema)]
#[serde(untagged)]
enum DeviceRequestRepr {
    Compact(String),
    Full {
        #[serde(default)]
        name: Option<String>,
        device_name: String,
        #[serde(default)]
        vendor_id: Option<String>,
        #[serde(default)]
        product_id: Option<String>,
    },
}

impl From<DeviceRequestRepr> for DeviceRequest {
    fn from(repr: DeviceRequestRepr) -> Self {
        match repr {
            DeviceRequestRepr::Compact(device_name) => Self::named(device_name),
            DeviceRequestRepr::Full {
                name,
                device_name,
                vendor_id,
                product_id,
            } => Self {
                name,
                device_name,
                vendor_id,
                product_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_index_stable() {
        let request = DeviceRequest::named("nvidia.com/GA102");
        assert_eq!(request.resolved_name(DeviceCategory::Gpu, 0), "gpu-0");
        assert_eq!(request.resolved_name(DeviceCategory::Host, 3), "hostdevice-3");
        assert_eq!(request.resolved_name(DeviceCategory::Usb, 1), "usb-1");
    }

    #[test]
    fn test_explicit_name_wins() {
        let request = DeviceRequest {
            name: Some("gpu1".to_string()),
            ..DeviceRequest::named("nvidia.com/GA102")
        };
        assert_eq!(request.resolved_name(DeviceCategory::Gpu, 0), "gpu1");
    }

    #[test]
    fn test_accepts_compact_and_full_forms() {
        let requests: Vec<DeviceRequest> = serde_json::from_str(
            r#"["intel.com/qat", {"device_name": "nvidia.com/GA102", "vendor_id": "10de"}]"#,
        )
        .unwrap();
        assert_eq!(requests[0], DeviceRequest::named("intel.com/qat"));
        assert_eq!(requests[1].device_name, "nvidia.com/GA102");
        assert_eq!(requests[1].vendor_id.as_deref(), Some("10de"));
        assert_eq!(requests[1].name, None);
    }
}
