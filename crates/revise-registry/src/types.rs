//! Notification types shared by registry implementations.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handle returned by [`crate::StateRegistry::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// What happened to a key.
#[derive(Clone, Debug, PartialEq)]
pub enum Change<'a> {
    /// The key now holds this value.
    Set(&'a Value),
    /// The key was removed.
    Removed,
}

impl Change<'_> {
    /// The new value, if the key still exists.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Change::Set(v) => Some(v),
            Change::Removed => None,
        }
    }
}

/// Callback invoked after a key changes.
pub type Listener = Arc<dyn Fn(&str, Change<'_>) + Send + Sync>;
