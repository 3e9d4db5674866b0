//! Lifecycle verbs and lifecycle states.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// An explicit lifecycle verb requested by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransitionRequest {
    /// Create the VM if absent, otherwise set it running
    Start,
    /// Set the VM not running (absent VMs are left absent)
    Stop,
    /// Remove the VM
    Delete,
}

impl TransitionRequest {
    /// Wire name of the verb
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for TransitionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a VM as last recorded by the engine.
///
/// ```text
/// absent --start--> created/running <--stop/start--> stopped
///   ^                                                   |
///   +---------------------- delete ---------------------+
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransitionState {
    /// No remote object
    #[default]
    Absent,
    /// Remote object was just created
    Created,
    /// Remote object exists with `running = true`
    Running,
    /// Remote object exists with `running = false` (or was never created)
    Stopped,
}

impl TransitionState {
    /// Coarse, caller-visible status string
    pub fn vm_status(self) -> &'static str {
        match self {
            Self::Absent => "Absent",
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.vm_status())
    }
}

/// Deserialize an optional transition, treating an empty string as "none".
pub fn deserialize_transition<'de, D>(deserializer: D) -> Result<Option<TransitionRequest>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("start") => Ok(Some(TransitionRequest::Start)),
        Some("stop") => Ok(Some(TransitionRequest::Stop)),
        Some("delete") => Ok(Some(TransitionRequest::Delete)),
        Some(other) => Err(serde::de::Error::unknown_variant(other, &["start", "stop", "delete"])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default, deserialize_with = "deserialize_transition")]
        transition: Option<TransitionRequest>,
    }

    #[test]
    fn test_empty_transition_is_none() {
        let w: Wrapper = serde_json::from_str(r#"{"transition": ""}"#).unwrap();
        assert_eq!(w.transition, None);
        let w: Wrapper = serde_json::from_str("{}").unwrap();
        assert_eq!(w.transition, None);
    }

    #[test]
    fn test_known_transitions_parse() {
        let w: Wrapper = serde_json::from_str(r#"{"transition": "stop"}"#).unwrap();
        assert_eq!(w.transition, Some(TransitionRequest::Stop));
    }

    #[test]
    fn test_unknown_transition_is_rejected() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"transition": "pause"}"#).is_err());
    }

    #[test]
    fn test_state_status_strings() {
        assert_eq!(TransitionState::Created.vm_status(), "Created");
        assert_eq!(TransitionState::default(), TransitionState::Absent);
    }
}
