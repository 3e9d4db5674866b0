//! Toleration rules and their compact string grammar.
//!
//! Rules are written as `key[=value]:effect`:
//! - `dedicated=gpu:NoSchedule` tolerates a taint with that exact value
//! - `gpu:NoExecute` tolerates any value of the `gpu` taint
//!
//! A string without an effect is accepted as a key-only rule with the
//! `NoSchedule` effect instead of failing the whole build.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Effect applied when the grammar does not carry one
pub const DEFAULT_TOLERATION_EFFECT: &str = "NoSchedule";

/// Toleration operator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum TolerationOperator {
    /// Matches any value of the key
    Exists,

    /// Matches only the given value
    Equal,
}

impl TolerationOperator {
    /// Wire name of the operator
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exists => "Exists",
            Self::Equal => "Equal",
        }
    }
}

/// A parsed toleration.
///
/// Invariant: `operator` is `Exists` exactly when `value` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub struct TolerationRule {
    /// Taint key
    pub key: String,

    /// Match operator
    pub operator: TolerationOperator,

    /// Taint value (only for `Equal`)
    pub value: Option<String>,

    /// Taint effect (NoSchedule, PreferNoSchedule, NoExecute)
    pub effect: String,
}

impl TolerationRule {
    /// Parse the compact grammar. Never fails; see the module docs for the
    /// fallback applied to malformed input.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let Some((key_value, effect)) = raw.split_once(':') else {
            return Self::key_only(raw, DEFAULT_TOLERATION_EFFECT);
        };

        let effect = if effect.is_empty() {
            DEFAULT_TOLERATION_EFFECT
        } else {
            effect
        };

        match key_value.split_once('=') {
            Some((key, value)) if !value.is_empty() => Self {
                key: key.to_string(),
                operator: TolerationOperator::Equal,
                value: Some(value.to_string()),
                effect: effect.to_string(),
            },
            // `key=:effect` carries no value, so it can only be an Exists rule
            Some((key, _)) => Self::key_only(key, effect),
            None => Self::key_only(key_value, effect),
        }
    }

    fn key_only(key: &str, effect: &str) -> Self {
        Self {
            key: key.to_string(),
            operator: TolerationOperator::Exists,
            value: None,
            effect: effect.to_string(),
        }
    }
}

impl From<String> for TolerationRule {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for TolerationRule {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<TolerationRule> for String {
    fn from(rule: TolerationRule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for TolerationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}:{}", self.key, value, self.effect),
            None => write!(f, "{}:{}", self.key, self.effect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_effect_is_equal() {
        let rule = TolerationRule::parse("dedicated=gpu:NoSchedule");
        assert_eq!(rule.key, "dedicated");
        assert_eq!(rule.operator, TolerationOperator::Equal);
        assert_eq!(rule.value.as_deref(), Some("gpu"));
        assert_eq!(rule.effect, "NoSchedule");
    }

    #[test]
    fn test_key_effect_is_exists() {
        let rule = TolerationRule::parse("nvidia.com/gpu:NoExecute");
        assert_eq!(rule.key, "nvidia.com/gpu");
        assert_eq!(rule.operator, TolerationOperator::Exists);
        assert_eq!(rule.value, None);
        assert_eq!(rule.effect, "NoExecute");
    }

    #[test]
    fn test_missing_effect_falls_back_to_key_only_no_schedule() {
        let rule = TolerationRule::parse("special");
        assert_eq!(rule.key, "special");
        assert_eq!(rule.operator, TolerationOperator::Exists);
        assert_eq!(rule.effect, DEFAULT_TOLERATION_EFFECT);
    }

    #[test]
    fn test_empty_value_keeps_operator_invariant() {
        let rule = TolerationRule::parse("dedicated=:NoSchedule");
        assert_eq!(rule.operator, TolerationOperator::Exists);
        assert_eq!(rule.value, None);
    }

    #[test]
    fn test_only_first_equals_splits_key() {
        let rule = TolerationRule::parse("k=a=b:PreferNoSchedule");
        assert_eq!(rule.key, "k");
        assert_eq!(rule.value.as_deref(), Some("a=b"));
        assert_eq!(rule.effect, "PreferNoSchedule");
    }

    #[test]
    fn test_deserializes_from_string() {
        let rules: Vec<TolerationRule> =
            serde_json::from_str(r#"["a=b:NoSchedule", "c:NoExecute"]"#).unwrap();
        assert_eq!(rules[0].operator, TolerationOperator::Equal);
        assert_eq!(rules[1].operator, TolerationOperator::Exists);
        assert_eq!(serde_json::to_string(&rules[1]).unwrap(), r#""c:NoExecute""#);
    }
}
