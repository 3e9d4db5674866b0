//! Field-level patches applied to a fetched object before it is written
//! back. Everything a patch does not name is left as fetched.

use crate::node::ManifestNode;
use crate::object::RemoteObject;

/// One field assignment
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSet {
    /// Path below the object's top level, e.g. `["spec", "running"]`
    pub path: Vec<String>,
    /// New value
    pub value: ManifestNode,
}

/// Ordered list of field assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestPatch {
    sets: Vec<FieldSet>,
}

impl ManifestPatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an assignment
    #[must_use]
    pub fn set(mut self, path: &[&str], value: impl Into<ManifestNode>) -> Self {
        self.sets.push(FieldSet {
            path: path.iter().map(|s| (*s).to_string()).collect(),
            value: value.into(),
        });
        self
    }

    /// Patch that sets the run state of `current`.
    ///
    /// Objects managed through `spec.runStrategy` (and without
    /// `spec.running`) get `Always`/`Halted`, since the platform rejects
    /// objects carrying both fields.
    pub fn running(running: bool, current: &RemoteObject) -> Self {
        if current.running().is_none() && current.run_strategy().is_some() {
            let strategy = if running { "Always" } else { "Halted" };
            return Self::new().set(&["spec", "runStrategy"], strategy);
        }
        Self::new().set(&["spec", "running"], running)
    }

    /// Dotted paths this patch writes
    pub fn touched_paths(&self) -> Vec<String> {
        self.sets.iter().map(|set| set.path.join(".")).collect()
    }

    /// True when the patch would not change `object`
    pub fn is_noop_for(&self, object: &RemoteObject) -> bool {
        self.sets.iter().all(|set| {
            let path: Vec<&str> = set.path.iter().map(String::as_str).collect();
            object.field(&path) == Some(&set.value)
        })
    }

    /// Apply to `object` in place
    pub fn apply_to(&self, object: &mut RemoteObject) {
        for set in &self.sets {
            let path: Vec<&str> = set.path.iter().map(String::as_str).collect();
            object.set_field(&path, set.value.clone());
        }
    }

    /// Apply to a copy of `object`
    pub fn applied(&self, object: &RemoteObject) -> RemoteObject {
        let mut patched = object.clone();
        self.apply_to(&mut patched);
        patched
    }
}
