//! Pluggable diff strategies.
//!
//! A [`ComputeState`] turns a baseline and a new snapshot into the annotated
//! computed state. [`RecordArrayDiff`] is the stock strategy for
//! collections of identified records; any `Fn(&Value, &Value) -> Value`
//! closure is a strategy as well.

use revise_types::{IdRule, JsonPath};
use serde_json::Value;

use crate::annotate::{annotate_records, AnnotateOptions, RemovedPlacement};
use crate::error::{kind_name, DiffError, DiffResult};

/// A pure function from `(old, new)` to the computed state.
pub trait ComputeState: Send + Sync {
    fn compute(&self, old: &Value, new: &Value) -> DiffResult<Value>;
}

impl<F> ComputeState for F
where
    F: Fn(&Value, &Value) -> Value + Send + Sync,
{
    fn compute(&self, old: &Value, new: &Value) -> DiffResult<Value> {
        Ok(self(old, new))
    }
}

/// Diff a collection of identified records.
///
/// The collection lives at `collection` inside the snapshot (the root by
/// default). A baseline that is `null` or lacks the collection is treated
/// as empty, so every new record comes out `added`.
#[derive(Clone, Debug, Default)]
pub struct RecordArrayDiff {
    collection: JsonPath,
    options: AnnotateOptions,
}

impl RecordArrayDiff {
    pub fn new(rule: IdRule) -> Self {
        Self {
            collection: JsonPath::root(),
            options: AnnotateOptions {
                rule,
                ..Default::default()
            },
        }
    }

    /// Diff the array found at `collection` instead of the root.
    pub fn at(mut self, collection: JsonPath) -> Self {
        self.collection = collection;
        self
    }

    /// Write markers at `scope` inside each record.
    pub fn marker_scope(mut self, scope: JsonPath) -> Self {
        self.options.scope = scope;
        self
    }

    pub fn removed_placement(mut self, placement: RemovedPlacement) -> Self {
        self.options.placement = placement;
        self
    }

    pub fn rule(&self) -> &IdRule {
        &self.options.rule
    }
}

impl ComputeState for RecordArrayDiff {
    fn compute(&self, old: &Value, new: &Value) -> DiffResult<Value> {
        let rule = &self.options.rule;
        let new_items = match self.collection.resolve(new, rule) {
            Some(Value::Array(items)) => items,
            other => {
                return Err(DiffError::ShapeMismatch {
                    path: self.collection.to_string(),
                    expected: "array",
                    actual: other.map_or("nothing", kind_name),
                })
            }
        };
        let old_items: &[Value] = match self.collection.resolve(old, rule) {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => &[],
            Some(other) => {
                return Err(DiffError::ShapeMismatch {
                    path: self.collection.to_string(),
                    expected: "array",
                    actual: kind_name(other),
                })
            }
        };

        let annotated = Value::Array(annotate_records(old_items, new_items, &self.options));
        if self.collection.is_root() {
            return Ok(annotated);
        }

        let mut computed = new.clone();
        if let Some(slot) = self.collection.resolve_mut(&mut computed, rule) {
            *slot = annotated;
        }
        Ok(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_collection() {
        let strategy = RecordArrayDiff::default();
        let out = strategy
            .compute(&json!([{"id": 1}]), &json!([{"id": 1}, {"id": 2}]))
            .unwrap();
        assert_eq!(out, json!([{"id": 1}, {"id": 2, "diff": "added"}]));
    }

    #[test]
    fn nested_collection_keeps_other_fields_from_new() {
        let strategy = RecordArrayDiff::default().at(JsonPath::parse("/nodes").unwrap());
        let old = json!({"title": "a", "nodes": [{"id": "n1", "v": 1}]});
        let new = json!({"title": "b", "nodes": [{"id": "n1", "v": 2}]});
        let out = strategy.compute(&old, &new).unwrap();
        assert_eq!(out["title"], "b");
        assert_eq!(out["nodes"][0]["diff"], "changed");
    }

    #[test]
    fn null_baseline_is_empty() {
        let out = RecordArrayDiff::default()
            .compute(&Value::Null, &json!([{"id": 1}]))
            .unwrap();
        assert_eq!(out, json!([{"id": 1, "diff": "added"}]));
    }

    #[test]
    fn non_array_snapshot_is_shape_mismatch() {
        let err = RecordArrayDiff::default()
            .compute(&json!([]), &json!({"id": 1}))
            .unwrap_err();
        assert!(matches!(
            err,
            DiffError::ShapeMismatch { expected: "array", actual: "object", .. }
        ));
    }

    #[test]
    fn closures_are_strategies() {
        let replace = |_: &Value, new: &Value| new.clone();
        let strategy: &dyn ComputeState = &replace;
        assert_eq!(strategy.compute(&json!(1), &json!(2)).unwrap(), json!(2));
    }
}
