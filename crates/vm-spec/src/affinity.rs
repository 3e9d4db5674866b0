//! Node and pod affinity rules.
//!
//! Only the `requiredDuringSchedulingIgnoredDuringExecution` forms are
//! supported.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Scheduling affinity for the VM's launcher pod
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Affinity {
    /// Node affinity rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,

    /// Pod affinity rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_affinity: Option<PodAffinity>,
}

impl Affinity {
    /// True when no rule is set
    pub fn is_empty(&self) -> bool {
        self.node_affinity.as_ref().is_none_or(|n| n.required.is_empty())
            && self.pod_affinity.as_ref().is_none_or(|p| p.required.is_empty())
    }
}

/// Required node affinity
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NodeAffinity {
    /// Node selector terms; a node must match at least one
    #[serde(default)]
    pub required: Vec<NodeSelectorTerm>,
}

/// One node selector term; all expressions must match
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NodeSelectorTerm {
    /// Label match expressions
    #[serde(default)]
    pub match_expressions: Vec<MatchExpression>,
}

/// Label selector expression
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MatchExpression {
    /// Label key
    pub key: String,

    /// Operator (In, NotIn, Exists, DoesNotExist, Gt, Lt)
    pub operator: String,

    /// Label values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Required pod affinity
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PodAffinity {
    /// Pod affinity terms
    #[serde(default)]
    pub required: Vec<PodAffinityTerm>,
}

/// Co-location rule against pods matching a selector
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PodAffinityTerm {
    /// Pods to match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<MatchExpression>,

    /// Namespaces to search (empty: the VM's namespace)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    /// Topology domain key, e.g. `kubernetes.io/hostname`
    pub topology_key: String,
}
