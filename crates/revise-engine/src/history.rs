//! Per-key undo/redo history.
//!
//! Each entry is a finalized step: the baseline, the raw snapshot and the
//! computed state after any resolution. Undo and redo move whole entries
//! between two stacks and never recompute anything.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

/// One finalized step of a tracked state.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub old_state: Value,
    pub new_state: Value,
    pub computed_state: Value,
}

impl Snapshot {
    /// A step with no diff: all three states equal `value`.
    pub fn settled(value: Value) -> Self {
        Self {
            old_state: value.clone(),
            new_state: value.clone(),
            computed_state: value,
        }
    }
}

/// History of snapshots with a redo stack.
///
/// Holds at least one entry at all times.
#[derive(Clone, Debug)]
pub struct HistoryStack {
    entries: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    limit: Option<usize>,
}

impl HistoryStack {
    /// Start a history at `initial`. A `limit` of `Some(n)` keeps at most
    /// `n` entries (never fewer than one).
    pub fn new(initial: Snapshot, limit: Option<usize>) -> Self {
        Self {
            entries: VecDeque::from([initial]),
            redo: Vec::new(),
            limit: limit.map(|n| n.max(1)),
        }
    }

    /// The current step.
    pub fn current(&self) -> &Snapshot {
        // The deque is never empty.
        &self.entries[self.entries.len() - 1]
    }

    /// Record a new step. Invalidates the redo stack.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.push_back(snapshot);
        self.redo.clear();
        if let Some(limit) = self.limit {
            while self.entries.len() > limit {
                self.entries.pop_front();
            }
        }
    }

    /// Overwrite the current step (used after a resolution finalizes it).
    pub fn replace_current(&mut self, snapshot: Snapshot) {
        if let Some(last) = self.entries.back_mut() {
            *last = snapshot;
        }
    }

    /// Step back. Returns the restored step, or `None` at the earliest entry.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.entries.len() <= 1 {
            return None;
        }
        let undone = self.entries.pop_back()?;
        self.redo.push(undone);
        self.entries.back()
    }

    /// Step forward. Returns the restored step, or `None` if nothing was undone.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let redone = self.redo.pop()?;
        self.entries.push_back(redone);
        self.entries.back()
    }

    pub fn can_undo(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of history entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Computed states in chronological order.
    pub fn computed_states(&self) -> Vec<Value> {
        self.entries.iter().map(|s| s.computed_state.clone()).collect()
    }

    /// Computed states available to redo, next-to-redo last.
    pub fn redo_states(&self) -> Vec<Value> {
        self.redo.iter().map(|s| s.computed_state.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(n: i64) -> Snapshot {
        Snapshot::settled(json!(n))
    }

    #[test]
    fn undo_at_earliest_entry_is_noop() {
        let mut history = HistoryStack::new(step(0), None);
        assert!(history.undo().is_none());
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
    }

    #[test]
    fn undo_then_redo() {
        let mut history = HistoryStack::new(step(0), None);
        history.push(step(1));
        history.push(step(2));

        assert_eq!(history.undo().unwrap().computed_state, json!(1));
        assert_eq!(history.undo().unwrap().computed_state, json!(0));
        assert!(history.undo().is_none());
        assert_eq!(history.redo_states(), vec![json!(2), json!(1)]);

        assert_eq!(history.redo().unwrap().computed_state, json!(1));
        assert_eq!(history.redo().unwrap().computed_state, json!(2));
        assert!(history.redo().is_none());
    }

    #[test]
    fn push_clears_redo() {
        let mut history = HistoryStack::new(step(0), None);
        history.push(step(1));
        history.undo();
        assert!(history.can_redo());
        history.push(step(5));
        assert!(!history.can_redo());
        assert_eq!(history.computed_states(), vec![json!(0), json!(5)]);
    }

    #[test]
    fn replace_current_keeps_length() {
        let mut history = HistoryStack::new(step(0), None);
        history.push(step(1));
        history.replace_current(step(9));
        assert_eq!(history.computed_states(), vec![json!(0), json!(9)]);
    }

    #[test]
    fn limit_discards_oldest() {
        let mut history = HistoryStack::new(step(0), Some(2));
        history.push(step(1));
        history.push(step(2));
        assert_eq!(history.computed_states(), vec![json!(1), json!(2)]);
        assert_eq!(history.undo().unwrap().computed_state, json!(1));
        assert!(history.undo().is_none());
    }

    #[test]
    fn zero_limit_still_keeps_current() {
        let mut history = HistoryStack::new(step(0), Some(0));
        history.push(step(1));
        assert_eq!(history.len(), 1);
        assert_eq!(history.current().computed_state, json!(1));
    }
}
