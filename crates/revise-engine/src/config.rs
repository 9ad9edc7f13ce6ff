use std::path::Path;

use revise_diff::{RecordArrayDiff, RemovedPlacement};
use revise_types::{IdRule, JsonPath};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Configuration for a [`crate::DiffEngine`].
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Field used to identify records when a registration names no rule.
    pub id_field: String,
    /// Path inside each record where the default strategy writes markers.
    pub marker_scope: String,
    /// Where the default strategy places removed records.
    pub removed_placement: RemovedPlacement,
    /// When `true`, re-registering a key discards its diff state and
    /// history. Otherwise only the configuration is replaced.
    pub reset_on_reregister: bool,
    /// Maximum number of history entries kept per key.
    pub history_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            marker_scope: String::new(),
            removed_placement: RemovedPlacement::Original,
            reset_on_reregister: false,
            history_limit: None,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.id_field.is_empty() {
            return Err(EngineError::Config("id_field must not be empty".into()));
        }
        if self.history_limit == Some(0) {
            return Err(EngineError::Config("history_limit must be at least 1".into()));
        }
        JsonPath::parse(&self.marker_scope)?;
        Ok(())
    }

    pub fn id_rule(&self) -> IdRule {
        IdRule::field(self.id_field.as_str())
    }

    /// The stock strategy configured for `rule`.
    pub fn default_strategy(&self, rule: IdRule) -> EngineResult<RecordArrayDiff> {
        Ok(RecordArrayDiff::new(rule)
            .marker_scope(JsonPath::parse(&self.marker_scope)?)
            .removed_placement(self.removed_placement))
    }
}
