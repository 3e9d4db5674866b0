//! Cloud-init rendering and placement.
//!
//! User data is either embedded in the VM manifest or, when it exceeds the
//! inline limit, moved into a Secret that the cloud-init volume references
//! by name. This module only decides and constructs; creating the Secret is
//! the engine's job.

use crate::node::ManifestNode;
use crate::object::{ObjectMetadata, RemoteObject, SECRET_API_VERSION, SECRET_KIND};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;
use vm_spec::{AgentToken, ObjectKey};

/// Largest user-data payload embedded inline, in bytes
pub const INLINE_USERDATA_LIMIT: usize = 2048;

/// Data key of the overflow Secret
pub const USERDATA_KEY: &str = "userdata";

/// Name of the cloud-init volume and disk
pub const CLOUD_INIT_VOLUME: &str = "cloudinitdisk";

/// Agent endpoint used when none is configured
pub const DEFAULT_AGENT_URL: &str = "https://coder-dev.nrp-nautilus.io";

const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

const AGENT_BOOTSTRAP: &str = r#"#cloud-config
{user_data}

write_files:
  - path: /opt/coder/init
    permissions: "0755"
    content: |
      #!/bin/bash
      set -e
      curl -fsSL https://code-server.dev/install.sh | sh -s -- --method=standalone --prefix=/tmp/code-server --version 4.11.0
      /tmp/code-server/bin/code-server --auth none --port 13337 >/tmp/code-server.log 2>&1 &
      exec coder agent --url {agent_url} --token {token}
  - path: /etc/systemd/system/coder-agent.service
    permissions: "0644"
    content: |
      [Unit]
      Description=Coder Agent
      After=network-online.target
      Wants=network-online.target

      [Service]
      User=coder
      ExecStart=/opt/coder/init
      EnvironmentFile=/var/run/secrets/.coder-agent-token
      Restart=always
      RestartSec=10
      TimeoutStopSec=90
      KillMode=process
      OOMScoreAdjust=-900
      SyslogIdentifier=coder-agent

      [Install]
      WantedBy=multi-user.target

bootcmd:
  - mkdir -p /var/run/secrets
  - echo CODER_AGENT_TOKEN={token} > /var/run/secrets/.coder-agent-token

runcmd:
  - systemctl enable coder-agent
  - systemctl start coder-agent
"#;

/// Deterministic overflow Secret name: `<prefix>-<vm>-cloudinit`
pub fn overflow_secret_name(prefix: &str, vm_name: &str) -> String {
    format!("{prefix}-{vm_name}-cloudinit")
}

/// Final user data for a VM.
///
/// With a token the payload is always wrapped in the agent bootstrap
/// document, regardless of its size. A leading `#cloud-config` line in the
/// payload is dropped so the wrapped document carries a single header.
pub fn render_user_data(payload: &str, token: Option<&AgentToken>, agent_url: &str) -> String {
    let Some(token) = token else {
        return payload.to_string();
    };
    let body = match payload.strip_prefix(CLOUD_CONFIG_HEADER) {
        Some(rest) if rest.is_empty() || rest.starts_with(['\r', '\n']) => {
            rest.trim_start_matches(['\r', '\n'])
        }
        _ => payload,
    };
    AGENT_BOOTSTRAP
        .replace("{agent_url}", agent_url)
        .replace("{token}", token.expose())
        .replace("{user_data}", body)
}

/// Secret holding user data too large to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowSecret {
    /// Secret identity (same namespace as the VM)
    pub key: ObjectKey,

    /// Labels tying the Secret to its VM
    pub labels: BTreeMap<String, String>,

    /// Base64 encoded user data
    pub encoded: String,
}

impl OverflowSecret {
    /// Wire object for this Secret
    pub fn to_remote_object(&self) -> RemoteObject {
        let mut fields = BTreeMap::new();
        fields.insert("type".to_string(), ManifestNode::from("Opaque"));
        fields.insert(
            "data".to_string(),
            ManifestNode::object([(USERDATA_KEY, ManifestNode::from(self.encoded.as_str()))]),
        );
        RemoteObject {
            api_version: SECRET_API_VERSION.to_string(),
            kind: SECRET_KIND.to_string(),
            metadata: ObjectMetadata {
                name: self.key.name.clone(),
                namespace: self.key.namespace.clone(),
                labels: self.labels.clone(),
                ..Default::default()
            },
            fields,
        }
    }
}

/// Where the user data ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudInitPlacement {
    /// Embedded in the volume definition
    Inline(String),
    /// Stored in a Secret referenced by the volume
    Secret(OverflowSecret),
}

impl CloudInitPlacement {
    /// Choose the placement for `user_data`.
    ///
    /// Payloads of exactly `limit` bytes stay inline.
    pub fn decide(
        user_data: String,
        vm: &ObjectKey,
        secret_prefix: &str,
        limit: usize,
        labels: BTreeMap<String, String>,
    ) -> Self {
        if user_data.len() <= limit {
            return Self::Inline(user_data);
        }
        Self::Secret(OverflowSecret {
            key: ObjectKey::new(&vm.namespace, overflow_secret_name(secret_prefix, &vm.name)),
            labels,
            encoded: STANDARD.encode(user_data.as_bytes()),
        })
    }

    /// The `cloudinitdisk` volume entry
    pub fn volume(&self) -> ManifestNode {
        let source = match self {
            Self::Inline(user_data) => ManifestNode::object([("userData", ManifestNode::from(user_data.as_str()))]),
            Self::Secret(secret) => ManifestNode::object([(
                "secretRef",
                ManifestNode::object([("name", ManifestNode::from(secret.key.name.as_str()))]),
            )]),
        };
        ManifestNode::object([
            ("name", ManifestNode::from(CLOUD_INIT_VOLUME)),
            ("cloudInitNoCloud", source),
        ])
    }

    /// The overflow Secret, if one is needed
    pub fn secret(&self) -> Option<&OverflowSecret> {
        match self {
            Self::Secret(secret) => Some(secret),
            Self::Inline(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(payload: String) -> CloudInitPlacement {
        CloudInitPlacement::decide(
            payload,
            &ObjectKey::new("ns", "w1"),
            "coder",
            INLINE_USERDATA_LIMIT,
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_limit_is_inclusive() {
        assert!(matches!(place("a".repeat(2048)), CloudInitPlacement::Inline(_)));
        assert!(matches!(place("a".repeat(2049)), CloudInitPlacement::Secret(_)));
    }

    #[test]
    fn test_overflow_secret_is_base64_and_named_after_vm() {
        let placement = place("x".repeat(3000));
        let secret = placement.secret().unwrap();
        assert_eq!(secret.key, ObjectKey::new("ns", "coder-w1-cloudinit"));
        assert_eq!(secret.encoded.len(), 3000_usize.div_ceil(3) * 4);
        assert_eq!(STANDARD.decode(&secret.encoded).unwrap(), "x".repeat(3000).into_bytes());

        let volume = placement.volume();
        assert_eq!(
            volume.get_path(&["cloudInitNoCloud", "secretRef", "name"]).and_then(ManifestNode::as_str),
            Some("coder-w1-cloudinit")
        );
    }

    #[test]
    fn test_inline_volume_carries_user_data() {
        let volume = place("#cloud-config\n".to_string()).volume();
        assert_eq!(volume.get("name").and_then(ManifestNode::as_str), Some(CLOUD_INIT_VOLUME));
        assert_eq!(
            volume.get_path(&["cloudInitNoCloud", "userData"]).and_then(ManifestNode::as_str),
            Some("#cloud-config\n")
        );
    }

    #[test]
    fn test_token_wraps_even_small_payloads() {
        let token = AgentToken::new("tok123");
        let rendered = render_user_data("#cloud-config\npackages: [git]", Some(&token), "https://agent.example");
        assert!(rendered.starts_with("#cloud-config\npackages: [git]\n"));
        assert_eq!(rendered.matches("#cloud-config").count(), 1);
        assert!(rendered.contains("--url https://agent.example --token tok123"));
        assert!(rendered.contains("CODER_AGENT_TOKEN=tok123"));
    }

    #[test]
    fn test_only_exact_header_line_is_dropped() {
        let token = AgentToken::new("tok123");
        let archive = "#cloud-config-archive\n- type: text/x-shellscript";
        let rendered = render_user_data(archive, Some(&token), DEFAULT_AGENT_URL);
        assert!(rendered.contains(archive));

        let rendered = render_user_data("#cloud-config\r\nruncmd: [ls]", Some(&token), DEFAULT_AGENT_URL);
        assert!(rendered.starts_with("#cloud-config\nruncmd: [ls]\n"));
    }

    #[test]
    fn test_no_token_leaves_payload_untouched() {
        assert_eq!(render_user_data("raw", None, DEFAULT_AGENT_URL), "raw");
    }

    #[test]
    fn test_secret_object_shape() {
        let placement = place("y".repeat(2100));
        let object = placement.secret().unwrap().to_remote_object();
        assert_eq!(object.kind, "Secret");
        assert_eq!(object.metadata.namespace, "ns");
        assert!(object.fields.get("data").and_then(|d| d.get(USERDATA_KEY)).is_some());
    }
}
