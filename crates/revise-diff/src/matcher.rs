//! Identity matching between two snapshots of a record collection.
//!
//! Records are paired by identity, never by position. Content comparison is
//! structural and ignores `diff` markers, so a baseline that still carries
//! unresolved annotations compares equal to the same data without them.

use std::collections::{HashMap, HashSet};

use revise_types::{IdRule, JsonPath, RecordId};
use serde_json::Value;
use tracing::warn;

use crate::markers::eq_ignoring_markers;

/// Classification of a record from the new snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Present in both snapshots with equal content.
    Unchanged,
    /// Present in both snapshots with different content.
    Changed,
    /// Present only in the new snapshot.
    Added,
}

/// One record of the new snapshot and its counterpart in the old one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchEntry {
    pub new_index: usize,
    pub old_index: Option<usize>,
    pub kind: MatchKind,
}

/// The result of matching two collections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordMatch {
    /// One entry per record of the new collection, in new order.
    pub entries: Vec<MatchEntry>,
    /// Indices of old records with no counterpart, in old order.
    pub removed: Vec<usize>,
    /// Number of records that repeated an identity already seen.
    pub collisions: usize,
}

impl RecordMatch {
    /// Returns `true` if nothing was added, changed or removed.
    pub fn is_unchanged(&self) -> bool {
        self.removed.is_empty() && self.entries.iter().all(|e| e.kind == MatchKind::Unchanged)
    }

    fn count(&self, kind: MatchKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Number of unchanged records.
    pub fn unchanged(&self) -> usize {
        self.count(MatchKind::Unchanged)
    }

    /// Number of changed records.
    pub fn changed(&self) -> usize {
        self.count(MatchKind::Changed)
    }

    /// Number of added records.
    pub fn added(&self) -> usize {
        self.count(MatchKind::Added)
    }

    /// Iterate `(old, new)` pairs of the given kind.
    pub fn pairs<'a>(
        &'a self,
        kind: MatchKind,
        old: &'a [Value],
        new: &'a [Value],
    ) -> impl Iterator<Item = (Option<&'a Value>, &'a Value)> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.kind == kind)
            .map(move |e| (e.old_index.map(|i| &old[i]), &new[e.new_index]))
    }
}

/// Build an identity lookup over `records`. The first occurrence of an
/// identity wins; later duplicates are counted and left out.
pub fn index_by_identity(
    records: &[Value],
    rule: &IdRule,
) -> (HashMap<RecordId, usize>, usize) {
    let mut lookup = HashMap::with_capacity(records.len());
    let mut collisions = 0;
    for (index, record) in records.iter().enumerate() {
        let Some(id) = rule.identify(record) else {
            continue;
        };
        if lookup.contains_key(&id) {
            collisions += 1;
            warn!(%id, index, "duplicate record identity; first occurrence wins");
            continue;
        }
        lookup.insert(id, index);
    }
    (lookup, collisions)
}

/// Match `new` against `old` by identity.
///
/// When `compare_at` is not the root, content comparison looks only at the
/// value found at that path inside each record (falling back to the whole
/// record when either side lacks it).
///
/// Records without an identity cannot be matched: they are `Added` on the
/// new side and removed on the old side.
pub fn match_records(
    old: &[Value],
    new: &[Value],
    rule: &IdRule,
    compare_at: &JsonPath,
) -> RecordMatch {
    let (lookup, mut collisions) = index_by_identity(old, rule);
    let mut visited: HashSet<usize> = HashSet::with_capacity(old.len());
    let mut seen: HashSet<RecordId> = HashSet::with_capacity(new.len());
    let mut entries = Vec::with_capacity(new.len());

    for (new_index, record) in new.iter().enumerate() {
        let id = rule.identify(record);
        let old_index = match id {
            Some(id) if !seen.insert(id.clone()) => {
                collisions += 1;
                warn!(%id, new_index, "duplicate record identity in new snapshot; treating as added");
                None
            }
            Some(id) => lookup.get(&id).copied(),
            None => None,
        };

        let kind = match old_index {
            None => MatchKind::Added,
            Some(i) => {
                visited.insert(i);
                if same_content(&old[i], record, compare_at) {
                    MatchKind::Unchanged
                } else {
                    MatchKind::Changed
                }
            }
        };
        entries.push(MatchEntry {
            new_index,
            old_index,
            kind,
        });
    }

    let removed = (0..old.len()).filter(|i| !visited.contains(i)).collect();
    RecordMatch {
        entries,
        removed,
        collisions,
    }
}

fn same_content(old: &Value, new: &Value, compare_at: &JsonPath) -> bool {
    if !compare_at.is_root() {
        let rule = IdRule::default();
        if let (Some(a), Some(b)) = (compare_at.resolve(old, &rule), compare_at.resolve(new, &rule)) {
            return eq_ignoring_markers(a, b);
        }
    }
    eq_ignoring_markers(old, new)
}
