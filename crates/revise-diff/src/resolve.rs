//! Accept/reject resolution of diff markers.
//!
//! Resolution is marker-driven below the addressed path: every annotated
//! record reachable under it is resolved, including records of nested
//! collections. Nothing outside the path is touched.
//!
//! | marker    | accept                 | reject                               |
//! |-----------|------------------------|--------------------------------------|
//! | `added`   | strip marker           | delete record                        |
//! | `changed` | strip marker           | restore old counterpart verbatim     |
//! | `removed` | delete record          | strip marker (old content stays)     |
//!
//! Old counterparts are located by identity in the baseline at the same
//! path.

use std::collections::HashMap;

use revise_types::{element_index, DiffMarker, IdRule, JsonPath, RecordId, MARKER_FIELD};
use serde_json::Value;
use tracing::{debug, warn};

use crate::markers::{clear_element_marker, element_marker};

/// Which way a resolution goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    Accept,
    Reject,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

/// Accept every marker under `path` in `computed`.
///
/// Returns `false` if `path` does not exist.
pub fn accept_at(computed: &mut Value, path: &JsonPath, rule: &IdRule) -> bool {
    resolve_at(computed, &Value::Null, path, rule, Resolution::Accept)
}

/// Reject every marker under `path` in `computed`, reverting against `old`.
///
/// Returns `false` if `path` does not exist.
pub fn reject_at(computed: &mut Value, old: &Value, path: &JsonPath, rule: &IdRule) -> bool {
    resolve_at(computed, old, path, rule, Resolution::Reject)
}

/// Accept every marker in `computed`.
pub fn accept_all(computed: &mut Value, rule: &IdRule) {
    accept_at(computed, &JsonPath::root(), rule);
}

/// Reject every marker in `computed`.
pub fn reject_all(computed: &mut Value, old: &Value, rule: &IdRule) {
    reject_at(computed, old, &JsonPath::root(), rule);
}

/// Resolve every marker under `path` in the given direction.
pub fn resolve_at(
    computed: &mut Value,
    old: &Value,
    path: &JsonPath,
    rule: &IdRule,
    resolution: Resolution,
) -> bool {
    let Some((parent_path, last)) = path.split_last() else {
        resolve_root(computed, old, rule, resolution);
        return true;
    };
    let Some(parent) = parent_path.resolve_mut(computed, rule) else {
        debug!(%path, "resolution path not found");
        return false;
    };
    let old_parent = parent_path.resolve(old, rule);

    match parent {
        Value::Array(items) => {
            let Some(index) = element_index(items, last, rule) else {
                debug!(%path, "resolution element not found");
                return false;
            };
            let old_record = old_parent
                .and_then(Value::as_array)
                .and_then(|old_items| counterpart(old_items, &items[index], last, rule));
            if let Some(record) = resolve_record(items[index].clone(), old_record, rule, resolution) {
                items[index] = record;
            } else {
                items.remove(index);
            }
            true
        }
        Value::Object(map) => {
            if !map.contains_key(last) {
                debug!(%path, "resolution field not found");
                return false;
            }
            let old_field = old_parent.and_then(|p| p.get(last));
            resolve_field(map, last, old_field, rule, resolution);
            true
        }
        _ => {
            debug!(%path, "resolution path crosses a scalar");
            false
        }
    }
}

fn resolve_root(computed: &mut Value, old: &Value, rule: &IdRule, resolution: Resolution) {
    let own = DiffMarker::of(computed);
    match (own, resolution) {
        (Some(DiffMarker::Removed), Resolution::Accept)
        | (Some(DiffMarker::Added), Resolution::Reject) => {
            *computed = Value::Null;
            return;
        }
        (Some(DiffMarker::Changed), Resolution::Reject) if !old.is_null() => {
            let mut previous = old.clone();
            clear_own_marker(&mut previous);
            *computed = reverted(previous, rule);
            return;
        }
        (Some(_), _) => clear_own_marker(computed),
        (None, _) => {}
    }
    resolve_children(computed, Some(old), rule, resolution);
}

/// Resolve one array element. `None` means the element must be deleted.
fn resolve_record(
    mut record: Value,
    old: Option<&Value>,
    rule: &IdRule,
    resolution: Resolution,
) -> Option<Value> {
    let marker = element_marker(&record).map(|(_, m)| m);
    match (marker, resolution) {
        (Some(DiffMarker::Removed), Resolution::Accept)
        | (Some(DiffMarker::Added), Resolution::Reject) => return None,
        (Some(DiffMarker::Changed), Resolution::Reject) => match old {
            Some(previous) => {
                let mut previous = previous.clone();
                clear_element_marker(&mut previous);
                return Some(reverted(previous, rule));
            }
            None => {
                warn!(
                    id = ?rule.identify(&record),
                    "no baseline counterpart for changed record; keeping new content"
                );
                clear_element_marker(&mut record);
            }
        },
        (Some(_), _) => {
            clear_element_marker(&mut record);
        }
        (None, _) => {}
    }
    resolve_children(&mut record, old, rule, resolution);
    Some(record)
}

/// Resolve a named field of an object that is not itself an array element.
fn resolve_field(
    map: &mut serde_json::Map<String, Value>,
    key: &str,
    old: Option<&Value>,
    rule: &IdRule,
    resolution: Resolution,
) {
    let Some(child) = map.get_mut(key) else {
        return;
    };
    let own = if child.is_object() {
        DiffMarker::of(child)
    } else {
        None
    };
    match (own, resolution) {
        (Some(DiffMarker::Removed), Resolution::Accept)
        | (Some(DiffMarker::Added), Resolution::Reject) => {
            map.remove(key);
            return;
        }
        (Some(DiffMarker::Changed), Resolution::Reject) if old.is_some() => {
            if let Some(previous) = old {
                let mut previous = previous.clone();
                clear_own_marker(&mut previous);
                *child = reverted(previous, rule);
            }
            return;
        }
        (Some(_), _) => clear_own_marker(child),
        (None, _) => {}
    }
    resolve_children(child, old, rule, resolution);
}

/// Remove the marker stored directly on `value`.
fn clear_own_marker(value: &mut Value) {
    if DiffMarker::of(value).is_some() {
        if let Some(map) = value.as_object_mut() {
            map.remove(MARKER_FIELD);
        }
    }
}

/// A baseline value being restored by a reject. The baseline may still hold
/// markers from an earlier unresolved step; those are rejected as well, with
/// no older baseline to revert against.
fn reverted(mut previous: Value, rule: &IdRule) -> Value {
    resolve_children(&mut previous, None, rule, Resolution::Reject);
    previous
}

/// Resolve everything nested inside `value`; `value`'s own marker is the
/// caller's concern.
fn resolve_children(value: &mut Value, old: Option<&Value>, rule: &IdRule, resolution: Resolution) {
    match value {
        Value::Array(items) => {
            let old_items = old.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
            let lookup = identity_lookup(old_items, rule);
            let current = std::mem::take(items);
            for record in current {
                let previous = rule
                    .identify(&record)
                    .and_then(|id| lookup.get(&id).copied());
                if let Some(resolved) = resolve_record(record, previous, rule, resolution) {
                    items.push(resolved);
                }
            }
        }
        Value::Object(map) => {
            let keys: Vec<String> = map
                .iter()
                .filter(|(_, v)| v.is_object() || v.is_array())
                .map(|(k, _)| k.clone())
                .collect();
            for key in keys {
                let old_field = old.and_then(|o| o.get(key.as_str()));
                resolve_field(map, &key, old_field, rule, resolution);
            }
        }
        _ => {}
    }
}

fn identity_lookup<'a>(records: &'a [Value], rule: &IdRule) -> HashMap<RecordId, &'a Value> {
    let mut lookup = HashMap::with_capacity(records.len());
    for record in records {
        if let Some(id) = rule.identify(record) {
            lookup.entry(id).or_insert(record);
        }
    }
    lookup
}

fn counterpart<'a>(
    old_items: &'a [Value],
    record: &Value,
    segment: &str,
    rule: &IdRule,
) -> Option<&'a Value> {
    match rule.identify(record) {
        Some(id) => old_items.iter().find(|o| rule.identify(o).as_ref() == Some(&id)),
        None => element_index(old_items, segment, rule).map(|i| &old_items[i]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{annotate_records, AnnotateOptions};
    use crate::markers::{contains_markers, stripped};
    use proptest::prelude::*;
    use serde_json::json;

    fn path(p: &str) -> JsonPath {
        JsonPath::parse(p).unwrap()
    }

    fn roadmap() -> (Value, Value) {
        let old = json!([{"id": "1", "status": "done"}, {"id": "2", "status": "planned"}]);
        let computed = json!([
            {"id": "1", "status": "done"},
            {"id": "2", "status": "planned"},
            {"id": "3", "status": "planned", "diff": "added"}
        ]);
        (old, computed)
    }

    #[test]
    fn accept_added_keeps_record_without_marker() {
        let (_, mut computed) = roadmap();
        assert!(accept_at(&mut computed, &path(""), &IdRule::default()));
        let items = computed.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[2].get("diff").is_none());
    }

    #[test]
    fn reject_added_deletes_record() {
        let (old, mut computed) = roadmap();
        assert!(reject_at(&mut computed, &old, &path(""), &IdRule::default()));
        assert_eq!(computed, old);
    }

    #[test]
    fn reject_changed_restores_old_content() {
        let old = json!([{"id": "1", "data": {"title": "Node 1", "description": "Original node"}}]);
        let mut computed = json!([
            {"id": "1", "data": {"title": "Modified Node 1", "description": "Original node", "diff": "changed"}}
        ]);
        assert!(reject_at(&mut computed, &old, &path(""), &IdRule::default()));
        assert_eq!(computed[0]["data"]["title"], "Node 1");
        assert!(!contains_markers(&computed));
    }

    #[test]
    fn accept_and_reject_removed() {
        let old = json!([{"id": "a"}, {"id": "b"}]);
        let computed = json!([{"id": "a"}, {"id": "b", "diff": "removed"}]);

        let mut accepted = computed.clone();
        accept_all(&mut accepted, &IdRule::default());
        assert_eq!(accepted, json!([{"id": "a"}]));

        let mut rejected = computed;
        reject_all(&mut rejected, &old, &IdRule::default());
        assert_eq!(rejected, old);
    }

    #[test]
    fn single_element_by_identity() {
        let old = json!([{"id": "a", "v": 1}, {"id": "b", "v": 1}]);
        let mut computed = json!([
            {"id": "a", "v": 2, "diff": "changed"},
            {"id": "b", "v": 2, "diff": "changed"}
        ]);
        assert!(reject_at(&mut computed, &old, &path("/b"), &IdRule::default()));
        assert_eq!(computed[0], json!({"id": "a", "v": 2, "diff": "changed"}));
        assert_eq!(computed[1], json!({"id": "b", "v": 1}));
    }

    #[test]
    fn nested_collection_only() {
        let old = json!({"nodes": [{"id": "n"}], "edges": [{"id": "e"}]});
        let mut computed = json!({
            "nodes": [{"id": "n"}, {"id": "m", "diff": "added"}],
            "edges": [{"id": "e", "diff": "removed"}]
        });
        assert!(reject_at(&mut computed, &old, &path("/nodes"), &IdRule::default()));
        assert_eq!(computed["nodes"], json!([{"id": "n"}]));
        assert_eq!(computed["edges"][0]["diff"], "removed");
    }

    #[test]
    fn records_inside_nested_collection_of_an_element() {
        let old = json!([{"id": "p", "children": [{"id": "c1", "v": 1}]}]);
        let mut computed = json!([{
            "id": "p",
            "children": [{"id": "c1", "v": 2, "diff": "changed"}, {"id": "c2", "diff": "added"}]
        }]);
        let mut rejected = computed.clone();
        assert!(reject_at(&mut rejected, &old, &path("/p/children/c1"), &IdRule::default()));
        assert_eq!(rejected[0]["children"][0], json!({"id": "c1", "v": 1}));
        assert_eq!(rejected[0]["children"][1]["diff"], "added");

        reject_all(&mut computed, &old, &IdRule::default());
        assert_eq!(computed, old);
    }

    #[test]
    fn custom_rule_locates_counterparts() {
        let rule = IdRule::func(|v| v.get("key").and_then(RecordId::from_value));
        let old = json!([{"key": 7, "name": "seven"}]);
        let mut computed = json!([{"key": 7, "name": "SEVEN", "diff": "changed"}]);
        assert!(reject_at(&mut computed, &old, &path("/7"), &rule));
        assert_eq!(computed, old);
    }

    #[test]
    fn missing_path_is_reported() {
        let (old, mut computed) = roadmap();
        assert!(!accept_at(&mut computed, &path("/nope"), &IdRule::default()));
        assert!(!reject_at(&mut computed, &old, &path("/9/x"), &IdRule::default()));
        assert!(contains_markers(&computed));
    }

    #[test]
    fn mixed_markers_in_one_call() {
        let old = json!([{"id": 1, "v": 0}, {"id": 2}, {"id": 3}]);
        let new = json!([{"id": 1, "v": 1}, {"id": 3}, {"id": 4}]);
        let annotated = Value::Array(annotate_records(
            old.as_array().unwrap(),
            new.as_array().unwrap(),
            &AnnotateOptions::default(),
        ));

        let mut accepted = annotated.clone();
        accept_all(&mut accepted, &IdRule::default());
        assert_eq!(accepted, new);

        let mut rejected = annotated;
        reject_all(&mut rejected, &old, &IdRule::default());
        assert_eq!(rejected, json!([{"id": 1, "v": 0}, {"id": 2}, {"id": 3}]));
    }

    #[test]
    fn reject_restores_baseline_without_its_markers() {
        let old = json!([{"id": "a", "v": 2, "diff": "changed"}]);
        let mut computed = json!([{"id": "a", "v": 3, "diff": "changed"}]);
        reject_all(&mut computed, &old, &IdRule::default());
        assert_eq!(computed, json!([{"id": "a", "v": 2}]));

        let mut again = computed.clone();
        reject_all(&mut again, &old, &IdRule::default());
        assert_eq!(again, computed);
    }

    #[test]
    fn reject_reverts_unresolved_markers_inside_baseline() {
        let old = json!([{"id": "p", "v": 1, "children": [{"id": "c", "diff": "added"}]}]);
        let mut computed = json!([{
            "id": "p",
            "v": 2,
            "diff": "changed",
            "children": [{"id": "c", "diff": "added"}]
        }]);
        reject_all(&mut computed, &old, &IdRule::default());
        assert_eq!(computed, json!([{"id": "p", "v": 1, "children": []}]));
    }

    #[test]
    fn reject_changed_field_clears_baseline_marker() {
        let old = json!({"settings": {"theme": "light", "diff": "changed"}});
        let mut computed = json!({"settings": {"theme": "dark", "diff": "changed"}});
        reject_all(&mut computed, &old, &IdRule::default());
        assert_eq!(computed, json!({"settings": {"theme": "light"}}));
    }

    #[test]
    fn object_field_markers() {
        let old = json!({"settings": {"theme": "light"}});
        let mut computed = json!({"settings": {"theme": "dark", "diff": "changed"}, "extra": {"diff": "added"}});
        reject_all(&mut computed, &old, &IdRule::default());
        assert_eq!(computed, old);
    }

    fn records() -> impl Strategy<Value = Vec<Value>> {
        proptest::collection::btree_map(0u8..12, 0u8..4, 0..8).prop_map(|m| {
            m.into_iter()
                .map(|(id, v)| json!({"id": id, "v": v}))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn accept_all_yields_new(old in records(), new in records()) {
            let mut computed = Value::Array(annotate_records(&old, &new, &AnnotateOptions::default()));
            accept_all(&mut computed, &IdRule::default());
            prop_assert!(!contains_markers(&computed));
            prop_assert_eq!(computed, Value::Array(new));
        }

        #[test]
        fn reject_all_yields_old(old in records(), new in records()) {
            let old_value = Value::Array(old.clone());
            let mut computed = Value::Array(annotate_records(&old, &new, &AnnotateOptions::default()));
            reject_all(&mut computed, &old_value, &IdRule::default());
            prop_assert!(!contains_markers(&computed));
            let mut got: Vec<Value> = computed.as_array().cloned().unwrap_or_default();
            let mut want = old;
            got.sort_by_key(|r| r["id"].as_u64());
            want.sort_by_key(|r| r["id"].as_u64());
            prop_assert_eq!(got, want);
        }

        #[test]
        fn unchanged_records_are_unmarked(old in records(), new in records()) {
            let computed = annotate_records(&old, &new, &AnnotateOptions::default());
            for record in &computed {
                if old.iter().any(|o| o == &stripped(record)) && new.iter().any(|n| n == &stripped(record)) {
                    prop_assert!(record.get("diff").is_none());
                }
            }
        }
    }
}
