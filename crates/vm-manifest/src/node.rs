//! Manifest tree.
//!
//! The platform API speaks loosely-typed nested maps. `ManifestNode` keeps
//! that shape as a sum type so the builder and the state machine work on
//! typed values; JSON only appears at the `serde_json::Value` conversion
//! boundary below.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// One node of a manifest tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ManifestNode {
    /// JSON null
    #[default]
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Integer scalar
    Integer(i64),
    /// Floating point scalar
    Float(f64),
    /// String scalar
    String(String),
    /// Ordered list
    Array(Vec<ManifestNode>),
    /// String-keyed map
    Object(BTreeMap<String, ManifestNode>),
}

impl ManifestNode {
    /// Build an object from key/value pairs
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ManifestNode)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An empty object (`{}`)
    pub fn empty_object() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// String value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean value, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, if this is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Items, if this is an array
    pub fn as_array(&self) -> Option<&Vec<ManifestNode>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Entries, if this is an object
    pub fn as_object(&self) -> Option<&BTreeMap<String, ManifestNode>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable entries, if this is an object
    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, ManifestNode>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Child of an object by key
    pub fn get(&self, key: &str) -> Option<&ManifestNode> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Descend through nested objects
    pub fn get_path(&self, path: &[&str]) -> Option<&ManifestNode> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Mutable descent through nested objects
    pub fn get_path_mut(&mut self, path: &[&str]) -> Option<&mut ManifestNode> {
        path.iter()
            .try_fold(self, |node, key| node.as_object_mut().and_then(|map| map.get_mut(*key)))
    }

    /// Set a value at `path`, creating (or replacing non-object)
    /// intermediate nodes with objects. An empty path replaces `self`.
    pub fn set_path(&mut self, path: &[&str], value: ManifestNode) {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return;
        };
        let mut node = self;
        for key in parents {
            node = node.ensure_object().entry((*key).to_string()).or_insert_with(Self::empty_object);
        }
        node.ensure_object().insert((*last).to_string(), value);
    }

    /// Append to the array at `path`, creating it when missing
    pub fn push_at(&mut self, path: &[&str], item: ManifestNode) {
        match self.get_path_mut(path) {
            Some(Self::Array(items)) => items.push(item),
            _ => self.set_path(path, Self::Array(vec![item])),
        }
    }

    /// Remove a key from an object, returning the previous value
    pub fn remove(&mut self, key: &str) -> Option<ManifestNode> {
        self.as_object_mut().and_then(|map| map.remove(key))
    }

    fn ensure_object(&mut self) -> &mut BTreeMap<String, ManifestNode> {
        if !matches!(self, Self::Object(_)) {
            *self = Self::empty_object();
        }
        match self {
            Self::Object(map) => map,
            _ => unreachable!("node was just replaced with an object"),
        }
    }

    /// Numeric view used for lenient comparisons. Numeric strings count,
    /// since the API server renders integer quantities back as strings.
    fn as_number(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss, reason = "comparison only")]
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }
}

/// Paths where `observed` does not contain `desired`.
///
/// Objects are compared as subsets (keys the platform defaulted into the
/// observed object are ignored), arrays element-wise with equal length,
/// scalars by value; a number matches any numerically equal number or
/// numeric string.
pub fn subset_diff(desired: &ManifestNode, observed: Option<&ManifestNode>) -> Vec<String> {
    let mut changed = Vec::new();
    diff_into(desired, observed, String::new(), &mut changed);
    changed
}

fn diff_into(desired: &ManifestNode, observed: Option<&ManifestNode>, path: String, out: &mut Vec<String>) {
    match (desired, observed) {
        (ManifestNode::Null, None | Some(ManifestNode::Null)) => {}
        (ManifestNode::Object(want), Some(ManifestNode::Object(have))) => {
            for (key, value) in want {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                diff_into(value, have.get(key), child, out);
            }
        }
        (ManifestNode::Array(want), Some(ManifestNode::Array(have))) if want.len() == have.len() => {
            for (index, (w, h)) in want.iter().zip(have).enumerate() {
                diff_into(w, Some(h), format!("{path}[{index}]"), out);
            }
        }
        (want, Some(have)) => {
            let numeric = want.is_number() || have.is_number();
            let equal = match (want.as_number(), have.as_number()) {
                (Some(a), Some(b)) if numeric => (a - b).abs() < f64::EPSILON,
                _ => want == have,
            };
            if !equal {
                out.push(path);
            }
        }
        (_, None) => out.push(path),
    }
}

impl From<&str> for ManifestNode {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ManifestNode {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ManifestNode {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ManifestNode {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for ManifestNode {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<Vec<ManifestNode>> for ManifestNode {
    fn from(items: Vec<ManifestNode>) -> Self {
        Self::Array(items)
    }
}

impl From<&BTreeMap<String, String>> for ManifestNode {
    fn from(map: &BTreeMap<String, String>) -> Self {
        Self::object(map.iter().map(|(k, v)| (k.clone(), Self::from(v.as_str()))))
    }
}

impl From<serde_json::Value> for ManifestNode {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<ManifestNode> for serde_json::Value {
    fn from(node: ManifestNode) -> Self {
        use serde_json::Value;
        match node {
            ManifestNode::Null => Value::Null,
            ManifestNode::Bool(b) => Value::Bool(b),
            ManifestNode::Integer(i) => Value::from(i),
            ManifestNode::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
            ManifestNode::String(s) => Value::String(s),
            ManifestNode::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ManifestNode::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl Serialize for ManifestNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => items.serialize(serializer),
            Self::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ManifestNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
