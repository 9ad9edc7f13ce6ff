use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a record within a tracked collection.
///
/// Text and numeric identities never compare equal: `"1"` and `1` name two
/// different records. Numbers keep their canonical `serde_json` rendering so
/// that `RecordId` stays hashable; an integral float such as `1.0` renders
/// as the integer it equals, so `1` and `1.0` name the same record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordId {
    Text(String),
    Number(String),
}

impl RecordId {
    /// Extract an identity from a JSON scalar.
    ///
    /// Only strings and numbers are identities; anything else yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => Some(Self::Number(canonical_number(n))),
            _ => None,
        }
    }

    /// The identity as it would appear in a path segment.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Number(s) => s,
        }
    }
}

/// Largest magnitude below which every integer is exactly representable as
/// an `f64`.
const EXACT_F64_INTEGERS: f64 = 9_007_199_254_740_992.0;

fn canonical_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < EXACT_F64_INTEGERS => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Number(n.to_string())
    }
}

type IdentifyFn = dyn Fn(&Value) -> Option<RecordId> + Send + Sync;

/// How records are matched across two snapshots of the same collection.
///
/// The default rule reads a top-level field named `id`.
#[derive(Clone)]
pub enum IdRule {
    /// Read the identity from a top-level field of each record.
    Field(String),
    /// Derive the identity with a caller-supplied function.
    Func(Arc<IdentifyFn>),
}

impl IdRule {
    /// Rule reading the named field.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Rule backed by a closure.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<RecordId> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }

    /// Resolve the identity of `record`, if it has one.
    pub fn identify(&self, record: &Value) -> Option<RecordId> {
        match self {
            Self::Field(name) => record.get(name.as_str()).and_then(RecordId::from_value),
            Self::Func(f) => f(record),
        }
    }
}

impl Default for IdRule {
    fn default() -> Self {
        Self::Field("id".to_string())
    }
}

impl From<&str> for IdRule {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

impl From<String> for IdRule {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

impl fmt::Debug for IdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "IdRule::Field({name:?})"),
            Self::Func(_) => write!(f, "IdRule::Func(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_rule_reads_id_field() {
        let rule = IdRule::default();
        assert_eq!(rule.identify(&json!({"id": "a"})), Some(RecordId::from("a")));
        assert_eq!(rule.identify(&json!({"id": 7})), Some(RecordId::from(7)));
    }

    #[test]
    fn integral_floats_share_the_integer_identity() {
        let rule = IdRule::default();
        assert_eq!(rule.identify(&json!({"id": 1.0})), Some(RecordId::from(1)));
        assert_eq!(rule.identify(&json!({"id": -3.0})), rule.identify(&json!({"id": -3})));
        assert_ne!(rule.identify(&json!({"id": 1.5})), Some(RecordId::from(1)));
        assert_eq!(RecordId::from_value(&json!(1.5)).unwrap().as_str(), "1.5");
    }

    #[test]
    fn text_and_number_ids_are_distinct() {
        let rule = IdRule::default();
        let text = rule.identify(&json!({"id": "1"}));
        let num = rule.identify(&json!({"id": 1}));
        assert_ne!(text, num);
    }

    #[test]
    fn missing_or_non_scalar_id_yields_none() {
        let rule = IdRule::default();
        assert_eq!(rule.identify(&json!({"name": "x"})), None);
        assert_eq!(rule.identify(&json!({"id": null})), None);
        assert_eq!(rule.identify(&json!({"id": {"nested": 1}})), None);
        assert_eq!(rule.identify(&json!("scalar")), None);
    }

    #[test]
    fn custom_field_rule() {
        let rule = IdRule::from("key");
        assert_eq!(rule.identify(&json!({"key": "k1", "id": "ignored"})), Some(RecordId::from("k1")));
    }

    #[test]
    fn closure_rule() {
        let rule = IdRule::func(|v| {
            let a = v.get("a")?.as_str()?;
            let b = v.get("b")?.as_str()?;
            Some(RecordId::Text(format!("{a}:{b}")))
        });
        assert_eq!(
            rule.identify(&json!({"a": "x", "b": "y"})),
            Some(RecordId::from("x:y"))
        );
        assert_eq!(rule.identify(&json!({"a": "x"})), None);
    }

    #[test]
    fn as_str_matches_path_segment_form() {
        assert_eq!(RecordId::from("node-1").as_str(), "node-1");
        assert_eq!(RecordId::from(42).as_str(), "42");
    }

    #[test]
    fn debug_hides_closure() {
        let rule = IdRule::func(|_| None);
        assert_eq!(format!("{rule:?}"), "IdRule::Func(..)");
        assert_eq!(format!("{:?}", IdRule::default()), "IdRule::Field(\"id\")");
    }
}
