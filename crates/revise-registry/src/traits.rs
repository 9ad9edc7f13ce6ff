//! The [`StateRegistry`] trait defining the keyed value store interface.
//!
//! Any backend (in-memory, UI store bridge, shared map) implements this trait
//! to hold the published value of each tracked state key.

use serde_json::Value;

use crate::error::Result;
use crate::types::{Listener, SubscriptionId};

/// Keyed publish/subscribe store.
///
/// Implementations must be thread-safe (`Send + Sync`). Listeners must be
/// invoked after the new value is visible to `get` and outside any internal
/// lock, so a listener may read the registry (or anything that reads it)
/// without deadlocking.
pub trait StateRegistry: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key` and notify listeners.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove `key`.
    ///
    /// Returns `Ok(true)` if the key existed and was removed, `Ok(false)` if
    /// it did not exist.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Register a listener for one key, or for every key when `key` is
    /// `None`.
    fn subscribe(&self, key: Option<&str>, listener: Listener) -> Result<SubscriptionId>;

    /// Drop a listener. Returns `Ok(false)` if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<bool>;

    /// All keys currently stored, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    /// Whether `key` currently holds a value.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
