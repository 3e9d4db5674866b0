//! Change planning: what an update has to do to move the remote object to
//! the desired state.
//!
//! The engine owns the VM's labels and `spec.template`. `spec.running` is
//! driven by transitions, and everything else on the remote object (fields
//! the platform defaulted, status) is ignored.

use serde::Serialize;
use std::fmt;
use vm_manifest::{ManifestNode, RemoteObject, subset_diff};
use vm_spec::ObjectKey;

/// Planned change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChangePlan {
    /// Remote object is absent
    Create,
    /// Identity changed; delete `previous`, then create
    Replace { previous: ObjectKey },
    /// Owned fields differ at `changed_paths`
    UpdateInPlace { changed_paths: Vec<String> },
    /// Owned fields already match
    NoOp,
}

impl fmt::Display for ChangePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Replace { previous } => write!(f, "replace {previous}"),
            Self::UpdateInPlace { changed_paths } => {
                write!(f, "update in place ({})", changed_paths.join(", "))
            }
            Self::NoOp => f.write_str("no-op"),
        }
    }
}

/// Plan the change from `observed` to `desired`.
///
/// `previous` is the identity recorded by the last call, if any.
pub fn plan_changes(
    previous: Option<&ObjectKey>,
    desired: &RemoteObject,
    observed: Option<&RemoteObject>,
) -> ChangePlan {
    if let Some(previous) = previous.filter(|p| **p != desired.key()) {
        return ChangePlan::Replace {
            previous: previous.clone(),
        };
    }
    let Some(observed) = observed else {
        return ChangePlan::Create;
    };
    let changed_paths = diff_owned(desired, observed);
    if changed_paths.is_empty() {
        ChangePlan::NoOp
    } else {
        ChangePlan::UpdateInPlace { changed_paths }
    }
}

/// Owned paths where `observed` differs from `desired`
pub fn diff_owned(desired: &RemoteObject, observed: &RemoteObject) -> Vec<String> {
    let mut changed: Vec<String> = desired
        .metadata
        .labels
        .iter()
        .filter(|(key, value)| observed.metadata.labels.get(*key) != Some(*value))
        .map(|(key, _)| format!("metadata.labels.{key}"))
        .collect();

    if let Some(template) = desired.field(&["spec", "template"]) {
        changed.extend(
            subset_diff(template, observed.field(&["spec", "template"]))
                .into_iter()
                .map(|path| {
                    if path.is_empty() {
                        "spec.template".to_string()
                    } else if path.starts_with('[') {
                        format!("spec.template{path}")
                    } else {
                        format!("spec.template.{path}")
                    }
                }),
        );
    }
    changed
}

/// Copy the owned sections of `desired` onto `target`, leaving its run
/// flag, resourceVersion and everything else as fetched.
pub fn apply_owned(desired: &RemoteObject, target: &mut RemoteObject) {
    target
        .metadata
        .labels
        .extend(desired.metadata.labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    let template = desired
        .field(&["spec", "template"])
        .cloned()
        .unwrap_or_else(ManifestNode::empty_object);
    target.set_field(&["spec", "template"], template);
}
