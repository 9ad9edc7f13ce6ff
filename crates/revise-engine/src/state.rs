//! Per-key diff state and registration options.

use std::fmt;
use std::sync::Arc;

use revise_diff::ComputeState;
use revise_types::IdRule;
use serde::Serialize;
use serde_json::Value;

use crate::history::Snapshot;

/// Callback invoked with every computed state published for a key.
pub type Setter = Arc<dyn Fn(&Value) + Send + Sync>;

/// The live diff of one tracked key.
///
/// `computed_state` is the authoritative externally visible value;
/// `old_state` and `new_state` are kept for reverting and recomputing.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffState {
    pub old_state: Value,
    pub new_state: Value,
    pub computed_state: Value,
    /// `true` iff `computed_state` carries at least one marker.
    pub is_diff_mode: bool,
}

impl DiffState {
    pub(crate) fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            old_state: snapshot.old_state.clone(),
            new_state: snapshot.new_state.clone(),
            computed_state: snapshot.computed_state.clone(),
            is_diff_mode: revise_diff::contains_markers(&snapshot.computed_state),
        }
    }

    pub(crate) fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            old_state: self.old_state.clone(),
            new_state: self.new_state.clone(),
            computed_state: self.computed_state.clone(),
        }
    }
}

/// Read-only view of a key returned by
/// [`crate::DiffEngine::get_diff_history_state`].
#[derive(Clone, Debug)]
pub struct DiffHistoryState {
    pub diff_state: DiffState,
    /// Computed states in chronological order; the last is current.
    pub history: Vec<Value>,
    /// Computed states available to redo; the last is redone first.
    pub redo_stack: Vec<Value>,
    /// Identification rule bound at registration.
    pub rule: IdRule,
}

/// Options for [`crate::DiffEngine::register_diff_state`].
pub struct Registration {
    pub(crate) initial: Value,
    pub(crate) compute: Option<Arc<dyn ComputeState>>,
    pub(crate) rule: Option<IdRule>,
    pub(crate) setter: Option<Setter>,
}

impl Registration {
    pub fn new(initial: Value) -> Self {
        Self {
            initial,
            compute: None,
            rule: None,
            setter: None,
        }
    }

    /// Use a custom diff strategy instead of the configured record-array
    /// diff.
    pub fn compute(mut self, strategy: impl ComputeState + 'static) -> Self {
        self.compute = Some(Arc::new(strategy));
        self
    }

    /// Identification rule for the default strategy and for resolutions that
    /// do not name one.
    pub fn identify(mut self, rule: impl Into<IdRule>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Callback run on every publish, alongside the registry.
    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("initial", &self.initial)
            .field("custom_compute", &self.compute.is_some())
            .field("rule", &self.rule)
            .field("setter", &self.setter.is_some())
            .finish()
    }
}
