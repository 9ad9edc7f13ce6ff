//! In-memory state registry.
//!
//! [`InMemoryRegistry`] stores all values in a `HashMap` protected by a
//! `RwLock`. It implements the full [`StateRegistry`] trait and is the
//! registry used by the engine unless the host supplies its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde_json::Value;
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::traits::StateRegistry;
use crate::types::{Change, Listener, SubscriptionId};

struct Subscription {
    id: SubscriptionId,
    key: Option<String>,
    listener: Listener,
}

/// An in-memory implementation of [`StateRegistry`].
///
/// Data is lost when the registry is dropped.
pub struct InMemoryRegistry {
    values: RwLock<HashMap<String, Value>>,
    subscriptions: RwLock<Vec<Subscription>>,
    next_subscription: AtomicU64,
}

impl InMemoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    fn listeners_for(&self, key: &str) -> Result<Vec<Listener>> {
        let subs = self
            .subscriptions
            .read()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;
        Ok(subs
            .iter()
            .filter(|s| s.key.as_deref().map_or(true, |k| k == key))
            .map(|s| s.listener.clone())
            .collect())
    }

    fn notify(&self, key: &str, change: Change<'_>) -> Result<()> {
        let listeners = self.listeners_for(key)?;
        debug!(key, listeners = listeners.len(), "registry notify");
        for listener in listeners {
            listener(key, change.clone());
        }
        Ok(())
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.values.read().map(|v| v.len()).unwrap_or_default();
        let subs = self.subscriptions.read().map(|s| s.len()).unwrap_or_default();
        f.debug_struct("InMemoryRegistry")
            .field("keys", &keys)
            .field("subscriptions", &subs)
            .finish()
    }
}

impl StateRegistry for InMemoryRegistry {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        if key.is_empty() {
            return Err(RegistryError::InvalidKey {
                key: key.to_string(),
                reason: "key must not be empty".into(),
            });
        }
        {
            let mut values = self
                .values
                .write()
                .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;
            values.insert(key.to_string(), value.clone());
        }
        self.notify(key, Change::Set(&value))
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let existed = {
            let mut values = self
                .values
                .write()
                .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;
            values.remove(key).is_some()
        };
        if existed {
            self.notify(key, Change::Removed)?;
        }
        Ok(existed)
    }

    fn subscribe(&self, key: Option<&str>, listener: Listener) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let mut subs = self
            .subscriptions
            .write()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;
        subs.push(Subscription {
            id,
            key: key.map(str::to_string),
            listener,
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let mut subs = self
            .subscriptions
            .write()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;
        let before = subs.len();
        subs.retain(|s| s.id != id);
        Ok(subs.len() != before)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let values = self
            .values
            .read()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;
        let mut keys: Vec<String> = values.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
