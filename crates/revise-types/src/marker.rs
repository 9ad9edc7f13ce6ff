use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Name of the field that carries a [`DiffMarker`] inside a record.
pub const MARKER_FIELD: &str = "diff";

/// Annotation attached to a record that differs from its baseline.
///
/// A record without a `diff` field is unchanged, so there is no
/// `Unchanged` variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMarker {
    /// The record is new relative to the baseline.
    Added,
    /// The record exists in the baseline with different content.
    Changed,
    /// The record exists only in the baseline; its old content is shown.
    Removed,
}

impl DiffMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Removed => "removed",
        }
    }

    /// Read the marker stored directly on `record`, if any.
    ///
    /// A `diff` field holding anything other than one of the three marker
    /// strings is treated as ordinary data.
    pub fn of(record: &Value) -> Option<Self> {
        record
            .get(MARKER_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    pub fn to_value(self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl FromStr for DiffMarker {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(Self::Added),
            "changed" => Ok(Self::Changed),
            "removed" => Ok(Self::Removed),
            other => Err(TypeError::UnknownMarker(other.to_string())),
        }
    }
}

impl fmt::Display for DiffMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
