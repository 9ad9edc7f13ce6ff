//! Reading, writing and stripping `diff` markers inside JSON records.
//!
//! A record's marker may sit on the record itself or on a nested object
//! (for example `/data` when a renderer keeps display data there). Lookups
//! search breadth-first through nested objects but never descend into
//! arrays: markers inside a nested collection belong to that collection's
//! own elements.

use std::collections::VecDeque;

use revise_types::{DiffMarker, IdRule, JsonPath, MARKER_FIELD};
use serde_json::Value;

/// Whether `key: value` is a marker entry rather than ordinary data.
pub fn is_marker_entry(key: &str, value: &Value) -> bool {
    key == MARKER_FIELD && value.as_str().is_some_and(|s| s.parse::<DiffMarker>().is_ok())
}

/// Locate the marker that annotates `record` as a whole.
pub fn element_marker(record: &Value) -> Option<(JsonPath, DiffMarker)> {
    let mut queue = VecDeque::from([(JsonPath::root(), record)]);
    while let Some((path, value)) = queue.pop_front() {
        let Value::Object(map) = value else {
            continue;
        };
        if let Some(marker) = DiffMarker::of(value) {
            return Some((path, marker));
        }
        for (key, child) in map {
            if child.is_object() {
                queue.push_back((path.child(key.as_str()), child));
            }
        }
    }
    None
}

/// Remove the record-level marker found by [`element_marker`].
pub fn clear_element_marker(record: &mut Value) -> Option<DiffMarker> {
    let (path, marker) = element_marker(record)?;
    let holder = path.resolve_mut(record, &IdRule::default())?;
    holder.as_object_mut()?.remove(MARKER_FIELD);
    Some(marker)
}

/// Write `marker` at `scope` inside `record`, creating intermediate objects.
///
/// Returns `false` if the record is not an object or a non-object value
/// occupies the scope.
pub fn set_marker(record: &mut Value, scope: &JsonPath, marker: DiffMarker) -> bool {
    match scope.object_entry_mut(record, &IdRule::default()) {
        Some(map) => {
            map.insert(MARKER_FIELD.to_string(), marker.to_value());
            true
        }
        None => false,
    }
}

/// Whether any marker is reachable anywhere inside `value`.
pub fn contains_markers(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| is_marker_entry(k, v) || contains_markers(v)),
        Value::Array(items) => items.iter().any(contains_markers),
        _ => false,
    }
}

/// Remove every marker reachable inside `value`.
pub fn strip_markers(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|k, v| !is_marker_entry(k, v));
            map.values_mut().for_each(strip_markers);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_markers),
        _ => {}
    }
}

/// A copy of `value` with every marker removed.
pub fn stripped(value: &Value) -> Value {
    let mut copy = value.clone();
    strip_markers(&mut copy);
    copy
}

/// Structural equality that ignores marker entries on both sides.
pub fn eq_ignoring_markers(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let x_len = x.iter().filter(|(k, v)| !is_marker_entry(k, v)).count();
            let y_len = y.iter().filter(|(k, v)| !is_marker_entry(k, v)).count();
            x_len == y_len
                && x
                    .iter()
                    .filter(|(k, v)| !is_marker_entry(k, v))
                    .all(|(k, v)| {
                        y.get(k)
                            .is_some_and(|w| !is_marker_entry(k, w) && eq_ignoring_markers(v, w))
                    })
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(v, w)| eq_ignoring_markers(v, w))
        }
        _ => a == b,
    }
}
