//! Marker counts for an annotated snapshot.

use std::fmt;

use revise_types::DiffMarker;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::markers::is_marker_entry;

/// How many markers of each kind a computed state carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
}

impl DiffSummary {
    /// Count every marker reachable inside `value`.
    pub fn of(value: &Value) -> Self {
        let mut summary = Self::default();
        summary.visit(value);
        summary
    }

    fn visit(&mut self, value: &Value) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if is_marker_entry(key, child) {
                        if let Some(marker) = child.as_str().and_then(|s| s.parse().ok()) {
                            self.record(marker);
                        }
                    } else {
                        self.visit(child);
                    }
                }
            }
            Value::Array(items) => items.iter().for_each(|item| self.visit(item)),
            _ => {}
        }
    }

    fn record(&mut self, marker: DiffMarker) {
        match marker {
            DiffMarker::Added => self.added += 1,
            DiffMarker::Changed => self.changed += 1,
            DiffMarker::Removed => self.removed += 1,
        }
    }

    /// Returns `true` if there are no markers.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Total number of markers.
    pub fn total(&self) -> usize {
        self.added + self.changed + self.removed
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{} ~{} -{}", self.added, self.changed, self.removed)
    }
}
