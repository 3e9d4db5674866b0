//! Engine configuration.
//!
//! Passed explicitly to the engine; nothing here is process-global.

use std::time::Duration;
use thiserror::Error;
use vm_manifest::BuildOptions;
use vm_manifest::cloud_init::{DEFAULT_AGENT_URL, INLINE_USERDATA_LIMIT};

/// Per-call budgets for gateway requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Budget for VM reads
    pub read: Duration,

    /// Budget for VM and Secret creates
    pub create: Duration,

    /// Budget for VM updates
    pub update: Duration,

    /// Budget for VM and Secret deletes
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(60),
            create: Duration::from_secs(10 * 60),
            update: Duration::from_secs(5 * 60),
            delete: Duration::from_secs(5 * 60),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Namespace used when the desired state names none
    pub default_namespace: String,
    /// Value of the `app` label on managed objects
    pub managed_tag: String,
    /// Prefix of overflow Secret names
    pub secret_prefix: String,
    /// Largest inline cloud-init payload, in bytes
    pub inline_limit: usize,
    /// Agent endpoint written into the bootstrap script
    pub agent_url: String,
    /// Gateway call budgets
    pub timeouts: Timeouts,
    /// Delete the overflow Secret together with its VM
    pub cleanup_overflow_secret: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_namespace: "default".to_string(),
            managed_tag: "kubevirt-vm".to_string(),
            secret_prefix: "coder".to_string(),
            inline_limit: INLINE_USERDATA_LIMIT,
            agent_url: DEFAULT_AGENT_URL.to_string(),
            timeouts: Timeouts::default(),
            cleanup_overflow_secret: true,
        }
    }
}

/// Invalid configuration value
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid configuration: {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl EngineConfig {
    /// Load from `KUBEVIRT_*` environment variables, defaulting unset ones
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let secs = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match get(var) {
                None => Ok(default),
                Some(value) => match value.parse::<u64>() {
                    Ok(0) | Err(_) => Err(ConfigError {
                        var,
                        value,
                        reason: "expected a positive number of seconds",
                    }),
                    Ok(secs) => Ok(Duration::from_secs(secs)),
                },
            }
        };

        let inline_limit = match get("KUBEVIRT_INLINE_LIMIT") {
            None => defaults.inline_limit,
            Some(value) => value.parse().map_err(|_| ConfigError {
                var: "KUBEVIRT_INLINE_LIMIT",
                value,
                reason: "expected a byte count",
            })?,
        };

        let cleanup_overflow_secret = match get("KUBEVIRT_CLEANUP_OVERFLOW_SECRET") {
            None => defaults.cleanup_overflow_secret,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError {
                        var: "KUBEVIRT_CLEANUP_OVERFLOW_SECRET",
                        value,
                        reason: "expected true or false",
                    });
                }
            },
        };

        Ok(Self {
            default_namespace: get("KUBEVIRT_DEFAULT_NAMESPACE").unwrap_or(defaults.default_namespace),
            managed_tag: get("KUBEVIRT_MANAGED_TAG").unwrap_or(defaults.managed_tag),
            secret_prefix: get("KUBEVIRT_SECRET_PREFIX").unwrap_or(defaults.secret_prefix),
            inline_limit,
            agent_url: get("KUBEVIRT_AGENT_URL").unwrap_or(defaults.agent_url),
            timeouts: Timeouts {
                read: secs("KUBEVIRT_READ_TIMEOUT_SECS", defaults.timeouts.read)?,
                create: secs("KUBEVIRT_CREATE_TIMEOUT_SECS", defaults.timeouts.create)?,
                update: secs("KUBEVIRT_UPDATE_TIMEOUT_SECS", defaults.timeouts.update)?,
                delete: secs("KUBEVIRT_DELETE_TIMEOUT_SECS", defaults.timeouts.delete)?,
            },
            cleanup_overflow_secret,
        })
    }

    /// Manifest builder settings derived from this configuration
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            managed_tag: self.managed_tag.clone(),
            secret_prefix: self.secret_prefix.clone(),
            inline_limit: self.inline_limit,
            agent_url: self.agent_url.clone(),
        }
    }
}
