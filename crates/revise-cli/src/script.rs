//! Replay scripts: a scripted session against one tracked key.
//!
//! ```json
//! {
//!   "key": "roadmap",
//!   "initial": [{"id": "1"}],
//!   "steps": [
//!     {"op": "snapshot", "value": [{"id": "1"}, {"id": "2"}]},
//!     {"op": "reject", "path": "/2"},
//!     {"op": "undo"}
//!   ]
//! }
//! ```

use std::fmt;

use anyhow::Context;
use revise_diff::DiffSummary;
use revise_engine::{DiffEngine, Registration};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_key() -> String {
    "state".to_string()
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default)]
    pub initial: Value,
    /// Identification field for resolutions that name none.
    #[serde(default)]
    pub id_field: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Snapshot {
        value: Value,
        #[serde(default = "yes")]
        diff: bool,
    },
    Accept {
        #[serde(default)]
        path: String,
        #[serde(default)]
        id_field: Option<String>,
    },
    Reject {
        #[serde(default)]
        path: String,
        #[serde(default)]
        id_field: Option<String>,
    },
    AcceptAll,
    RejectAll,
    Undo,
    Redo,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot { diff: true, .. } => write!(f, "snapshot"),
            Self::Snapshot { diff: false, .. } => write!(f, "snapshot (silent)"),
            Self::Accept { path, .. } => write!(f, "accept {}", display_path(path)),
            Self::Reject { path, .. } => write!(f, "reject {}", display_path(path)),
            Self::AcceptAll => write!(f, "accept all"),
            Self::RejectAll => write!(f, "reject all"),
            Self::Undo => write!(f, "undo"),
            Self::Redo => write!(f, "redo"),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// What one step did to the tracked key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub step: String,
    pub applied: bool,
    pub is_diff_mode: bool,
    pub summary: DiffSummary,
    pub state: Value,
}

impl Script {
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        serde_json::from_str(source).context("invalid replay script")
    }

    /// Run every step against `engine`, stopping at the first error.
    pub fn run(&self, engine: &DiffEngine) -> anyhow::Result<Vec<Outcome>> {
        let key = self.key.as_str();
        let mut registration = Registration::new(self.initial.clone());
        if let Some(field) = &self.id_field {
            registration = registration.identify(field.as_str());
        }
        engine.register_diff_state(key, registration)?;
        let default_field = self
            .id_field
            .clone()
            .unwrap_or_else(|| engine.config().id_field.clone());

        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let applied = self
                .apply(engine, step, &default_field)
                .with_context(|| format!("step {} ({step}) failed", index + 1))?;
            let state = engine
                .get_diff_history_state(key)
                .context("tracked key disappeared during replay")?;
            outcomes.push(Outcome {
                step: step.to_string(),
                applied,
                is_diff_mode: state.diff_state.is_diff_mode,
                summary: DiffSummary::of(&state.diff_state.computed_state),
                state: state.diff_state.computed_state,
            });
        }
        Ok(outcomes)
    }

    fn apply(&self, engine: &DiffEngine, step: &Step, default_field: &str) -> anyhow::Result<bool> {
        let key = self.key.as_str();
        let applied = match step {
            Step::Snapshot { value, diff } => engine.new_diff_state(key, value.clone(), *diff)?,
            Step::Accept { path, id_field } => {
                engine.accept_diff(key, path, id_field.as_deref().unwrap_or(default_field))?
            }
            Step::Reject { path, id_field } => {
                engine.reject_diff(key, path, id_field.as_deref().unwrap_or(default_field))?
            }
            Step::AcceptAll => engine.accept_all_diffs(key)?,
            Step::RejectAll => engine.reject_all_diffs(key)?,
            Step::Undo => engine.undo(key)?.is_some(),
            Step::Redo => engine.redo(key)?.is_some(),
        };
        Ok(applied)
    }
}
