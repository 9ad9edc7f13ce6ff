//! Diff annotation: produce a marked-up copy of a new record collection.
//!
//! Output records are copies; neither input is modified. Changed and added
//! records carry the new content, removed records carry the old content so
//! they stay visible until resolved.
//!
//! A baseline that still holds unresolved markers compounds with the new
//! snapshot:
//!
//! | baseline marker | record in new | result                       |
//! |-----------------|---------------|------------------------------|
//! | `added`         | present       | `added`                      |
//! | `added`         | absent        | dropped                      |
//! | `changed`       | present       | `changed`                    |
//! | `removed`       | present       | unchanged if equal, else `changed` |

use std::collections::HashMap;

use revise_types::{DiffMarker, IdRule, JsonPath};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::markers::{element_marker, set_marker, stripped};
use crate::matcher::{match_records, MatchKind};

/// Where removed records are placed in the annotated output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovedPlacement {
    /// Directly after the nearest preceding old neighbour that survived,
    /// or first if there is none.
    #[default]
    Original,
    /// After all surviving records, in old order.
    End,
}

/// Options for [`annotate_records`].
#[derive(Clone, Debug, Default)]
pub struct AnnotateOptions {
    /// Identification rule used to pair records.
    pub rule: IdRule,
    /// Where inside each record the marker is written (and content compared).
    pub scope: JsonPath,
    /// Placement of removed records.
    pub placement: RemovedPlacement,
}

/// Annotate `new` against `old`.
pub fn annotate_records(old: &[Value], new: &[Value], options: &AnnotateOptions) -> Vec<Value> {
    let matched = match_records(old, new, &options.rule, &options.scope);

    let mut survivors = Vec::with_capacity(new.len());
    for entry in &matched.entries {
        let carried = entry
            .old_index
            .and_then(|i| element_marker(&old[i]))
            .map(|(_, m)| m);
        let marker = match (entry.kind, carried) {
            (MatchKind::Added, _) => Some(DiffMarker::Added),
            (_, Some(DiffMarker::Added)) => Some(DiffMarker::Added),
            (_, Some(DiffMarker::Changed)) => Some(DiffMarker::Changed),
            (MatchKind::Changed, _) => Some(DiffMarker::Changed),
            (MatchKind::Unchanged, _) => None,
        };
        survivors.push(mark(&new[entry.new_index], marker, &options.scope));
    }

    let mut removed: Vec<(usize, Value)> = Vec::with_capacity(matched.removed.len());
    for &i in &matched.removed {
        if matches!(element_marker(&old[i]), Some((_, DiffMarker::Added))) {
            debug!(index = i, "dropping unresolved addition absent from new snapshot");
            continue;
        }
        removed.push((i, mark(&old[i], Some(DiffMarker::Removed), &options.scope)));
    }

    match options.placement {
        RemovedPlacement::End => {
            survivors.extend(removed.into_iter().map(|(_, record)| record));
            survivors
        }
        RemovedPlacement::Original => interleave(survivors, removed, &matched.entries, old.len()),
    }
}

fn mark(record: &Value, marker: Option<DiffMarker>, scope: &JsonPath) -> Value {
    let mut copy = stripped(record);
    if let Some(marker) = marker {
        if !set_marker(&mut copy, scope, marker) {
            debug!(%marker, %scope, "record cannot hold a marker; left unannotated");
        }
    }
    copy
}

/// Place each removed record right after the output position of the last
/// old record before it that survived into the new snapshot.
fn interleave(
    survivors: Vec<Value>,
    removed: Vec<(usize, Value)>,
    entries: &[crate::matcher::MatchEntry],
    old_len: usize,
) -> Vec<Value> {
    let mut new_index_of_old: Vec<Option<usize>> = vec![None; old_len];
    for entry in entries {
        if let Some(i) = entry.old_index {
            new_index_of_old[i] = Some(entry.new_index);
        }
    }

    let mut anchored: HashMap<Option<usize>, Vec<Value>> = HashMap::new();
    let mut removed = removed.into_iter().peekable();
    let mut anchor = None;
    for (old_index, new_index) in new_index_of_old.iter().enumerate() {
        if let Some(n) = new_index {
            anchor = Some(*n);
        }
        while let Some((_, record)) = removed.next_if(|(i, _)| *i == old_index) {
            anchored.entry(anchor).or_default().push(record);
        }
    }

    let mut out = Vec::with_capacity(survivors.len() + anchored.values().map(Vec::len).sum::<usize>());
    out.extend(anchored.remove(&None).unwrap_or_default());
    for (new_index, record) in survivors.into_iter().enumerate() {
        out.push(record);
        out.extend(anchored.remove(&Some(new_index)).unwrap_or_default());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::contains_markers;
    use serde_json::json;

    fn arr(v: Value) -> Vec<Value> {
        v.as_array().cloned().unwrap_or_default()
    }

    fn ids(records: &[Value]) -> Vec<String> {
        records
            .iter()
            .map(|r| r["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn unchanged_records_carry_no_marker() {
        let old = arr(json!([{"id": "1", "v": 1}]));
        let out = annotate_records(&old, &old, &AnnotateOptions::default());
        assert_eq!(out, old);
        assert!(!contains_markers(&Value::Array(out)));
    }

    #[test]
    fn added_changed_removed_are_marked() {
        let old = arr(json!([{"id": "a", "v": 1}, {"id": "b", "v": 1}]));
        let new = arr(json!([{"id": "a", "v": 2}, {"id": "c", "v": 1}]));
        let out = annotate_records(&old, &new, &AnnotateOptions::default());
        assert_eq!(
            out,
            arr(json!([
                {"id": "a", "v": 2, "diff": "changed"},
                {"id": "b", "v": 1, "diff": "removed"},
                {"id": "c", "v": 1, "diff": "added"}
            ]))
        );
    }

    #[test]
    fn removed_keep_old_content() {
        let old = arr(json!([{"id": "a", "title": "old title"}]));
        let out = annotate_records(&old, &[], &AnnotateOptions::default());
        assert_eq!(out, arr(json!([{"id": "a", "title": "old title", "diff": "removed"}])));
    }

    #[test]
    fn removed_at_original_position() {
        let old = arr(json!([{"id": "x"}, {"id": "a"}, {"id": "b"}, {"id": "c"}, {"id": "d"}]));
        let new = arr(json!([{"id": "a"}, {"id": "c"}, {"id": "n"}]));
        let out = annotate_records(&old, &new, &AnnotateOptions::default());
        assert_eq!(ids(&out), vec!["x", "a", "b", "c", "d", "n"]);
    }

    #[test]
    fn removed_at_end() {
        let old = arr(json!([{"id": "x"}, {"id": "a"}, {"id": "b"}]));
        let new = arr(json!([{"id": "a"}, {"id": "n"}]));
        let options = AnnotateOptions {
            placement: RemovedPlacement::End,
            ..Default::default()
        };
        let out = annotate_records(&old, &new, &options);
        assert_eq!(ids(&out), vec!["a", "n", "x", "b"]);
    }

    #[test]
    fn marker_written_at_scope() {
        let old = arr(json!([{"id": "1", "data": {"label": "a"}}]));
        let new = arr(json!([
            {"id": "1", "data": {"label": "b"}},
            {"id": "2", "data": {"label": "c"}}
        ]));
        let options = AnnotateOptions {
            scope: JsonPath::parse("/data").unwrap(),
            ..Default::default()
        };
        let out = annotate_records(&old, &new, &options);
        assert_eq!(out[0]["data"]["diff"], "changed");
        assert_eq!(out[1]["data"]["diff"], "added");
        assert!(out[0].get("diff").is_none());
    }

    #[test]
    fn producer_markers_are_overwritten() {
        let old = arr(json!([{"id": "1", "status": "done"}]));
        let new = arr(json!([
            {"id": "1", "status": "done", "diff": "changed"},
            {"id": "3", "status": "planned", "diff": "removed"}
        ]));
        let out = annotate_records(&old, &new, &AnnotateOptions::default());
        assert!(out[0].get("diff").is_none());
        assert_eq!(out[1]["diff"], "added");
    }

    #[test]
    fn unresolved_markers_compound() {
        let baseline = arr(json!([
            {"id": "a", "v": 1, "diff": "added"},
            {"id": "c", "v": 1, "diff": "changed"},
            {"id": "r", "v": 1, "diff": "removed"},
            {"id": "gone", "v": 1, "diff": "added"}
        ]));
        let new = arr(json!([
            {"id": "a", "v": 1},
            {"id": "c", "v": 1},
            {"id": "r", "v": 1}
        ]));
        let out = annotate_records(&baseline, &new, &AnnotateOptions::default());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["diff"], "added");
        assert_eq!(out[1]["diff"], "changed");
        assert!(out[2].get("diff").is_none());
    }

    #[test]
    fn annotation_is_pure() {
        let old = arr(json!([{"id": "a", "v": 1}]));
        let new = arr(json!([{"id": "a", "v": 2}]));
        let first = annotate_records(&old, &new, &AnnotateOptions::default());
        let second = annotate_records(&old, &new, &AnnotateOptions::default());
        assert_eq!(first, second);
        assert_eq!(old, arr(json!([{"id": "a", "v": 1}])));
        assert_eq!(new, arr(json!([{"id": "a", "v": 2}])));
    }
}
