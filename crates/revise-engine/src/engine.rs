//! The diff state engine.
//!
//! [`DiffEngine`] owns one [`DiffState`] plus a [`HistoryStack`] per
//! registered key. Every mutating operation computes its result in full
//! under the engine lock, commits it, and queues the new computed state for
//! the [`StateRegistry`] and the key's setter before releasing the lock.
//! The queue is delivered in commit order outside the lock, so subscribers
//! never see a half-applied or stale update and may call back into the
//! engine. An operation whose publication is picked up by a delivery
//! already running on another thread returns once it is queued.
//!
//! Recoverable conditions (unknown key, nothing in diff mode, path not
//! found, nothing to resolve) are reported as `Ok(false)` / `Ok(None)`.
//! Only programmer errors such as a snapshot of the wrong shape are
//! returned as `Err`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use revise_diff::{contains_markers, kind_name, resolve_at, stripped, ComputeState, DiffSummary, Resolution};
use revise_registry::{InMemoryRegistry, StateRegistry};
use revise_types::{IdRule, JsonPath};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::history::{HistoryStack, Snapshot};
use crate::outbox::{Outbox, Publication};
use crate::state::{DiffHistoryState, DiffState, Registration, Setter};

struct Entry {
    state: DiffState,
    history: HistoryStack,
    compute: Arc<dyn ComputeState>,
    rule: IdRule,
    setter: Option<Setter>,
}

impl Entry {
    fn publication(&self, key: &str) -> Publication {
        Publication::Set {
            key: key.to_string(),
            computed: self.state.computed_state.clone(),
            setter: self.setter.clone(),
        }
    }
}

/// Tracks named states across snapshots and resolves their diffs.
pub struct DiffEngine {
    registry: Arc<dyn StateRegistry>,
    config: EngineConfig,
    entries: RwLock<HashMap<String, Entry>>,
    outbox: Outbox,
}

impl DiffEngine {
    /// Create an engine publishing into `registry` with the default
    /// configuration.
    pub fn new(registry: Arc<dyn StateRegistry>) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
            entries: RwLock::new(HashMap::new()),
            outbox: Outbox::default(),
        }
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(registry: Arc<dyn StateRegistry>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            config,
            entries: RwLock::new(HashMap::new()),
            outbox: Outbox::default(),
        })
    }

    /// Create an engine backed by a fresh [`InMemoryRegistry`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRegistry::new()))
    }

    pub fn registry(&self) -> &Arc<dyn StateRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn write(&self) -> EngineResult<RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .write()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))
    }

    fn read_entry<T>(&self, key: &str, f: impl FnOnce(&Entry) -> T) -> Option<T> {
        let entries = self.entries.read().ok()?;
        entries.get(key).map(f)
    }

    fn flush(&self) -> EngineResult<()> {
        self.outbox.drain(self.registry.as_ref())
    }

    // ---- Registration ----

    /// Register (or re-register) `key`.
    ///
    /// Without a custom strategy the key is diffed as a collection of
    /// records identified by the registration's rule (or the configured
    /// `id_field`). Re-registering replaces the strategy, rule and setter;
    /// the diff state and history survive unless `reset_on_reregister` is
    /// set, in which case the key restarts from `initial`.
    pub fn register_diff_state(&self, key: &str, registration: Registration) -> EngineResult<()> {
        if key.is_empty() {
            return Err(EngineError::InvalidKey(key.to_string()));
        }
        let Registration {
            initial,
            compute,
            rule,
            setter,
        } = registration;
        let rule = rule.unwrap_or_else(|| self.config.id_rule());
        let compute: Arc<dyn ComputeState> = match compute {
            Some(custom) => custom,
            None => Arc::new(self.config.default_strategy(rule.clone())?),
        };

        {
            let mut entries = self.write()?;
            let preserve = !self.config.reset_on_reregister && entries.contains_key(key);
            match entries.get_mut(key) {
                Some(entry) if preserve => {
                    entry.compute = compute;
                    entry.rule = rule;
                    entry.setter = setter;
                    info!(key, "re-registered diff state; keeping history");
                    self.outbox.push(entry.publication(key))?;
                }
                _ => {
                    let snapshot = Snapshot::settled(initial);
                    let entry = Entry {
                        state: DiffState::from_snapshot(&snapshot),
                        history: HistoryStack::new(snapshot, self.config.history_limit),
                        compute,
                        rule,
                        setter,
                    };
                    self.outbox.push(entry.publication(key))?;
                    entries.insert(key.to_string(), entry);
                    info!(key, "registered diff state");
                }
            }
        }
        self.flush()
    }

    /// Forget `key` and remove it from the registry.
    ///
    /// Returns `Ok(false)` if the key was not registered.
    pub fn unregister_diff_state(&self, key: &str) -> EngineResult<bool> {
        let existed = {
            let mut entries = self.write()?;
            let existed = entries.remove(key).is_some();
            if existed {
                self.outbox.push(Publication::Remove {
                    key: key.to_string(),
                })?;
                info!(key, "unregistered diff state");
            }
            existed
        };
        self.flush()?;
        Ok(existed)
    }

    /// Snapshot of everything the engine holds for `key`.
    pub fn get_diff_history_state(&self, key: &str) -> Option<DiffHistoryState> {
        self.read_entry(key, |entry| DiffHistoryState {
            diff_state: entry.state.clone(),
            history: entry.history.computed_states(),
            redo_stack: entry.history.redo_states(),
            rule: entry.rule.clone(),
        })
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Marker counts of the current computed state.
    pub fn summary(&self, key: &str) -> Option<DiffSummary> {
        self.read_entry(key, |entry| DiffSummary::of(&entry.state.computed_state))
    }

    pub fn can_undo(&self, key: &str) -> bool {
        self.read_entry(key, |entry| entry.history.can_undo())
            .unwrap_or(false)
    }

    pub fn can_redo(&self, key: &str) -> bool {
        self.read_entry(key, |entry| entry.history.can_redo())
            .unwrap_or(false)
    }

    // ---- Snapshots ----

    /// Apply a new snapshot to `key`.
    ///
    /// The current computed state (unresolved markers included) becomes the
    /// baseline. With `is_diff_mode_hint` the registered strategy annotates
    /// the snapshot against it; without, the snapshot is applied silently
    /// with every marker stripped. Either way a new history entry is pushed
    /// and the redo stack is cleared.
    ///
    /// Returns `Ok(false)` if `key` is not registered.
    pub fn new_diff_state(&self, key: &str, snapshot: Value, is_diff_mode_hint: bool) -> EngineResult<bool> {
        {
            let mut entries = self.write()?;
            let Some(entry) = entries.get_mut(key) else {
                debug!(key, "new snapshot for unregistered key ignored");
                return Ok(false);
            };

            let baseline = entry.state.computed_state.clone();
            check_shape(key, &baseline, &snapshot)?;
            let computed = if is_diff_mode_hint {
                entry.compute.compute(&baseline, &snapshot)?
            } else {
                stripped(&snapshot)
            };
            let is_diff_mode = is_diff_mode_hint && contains_markers(&computed);

            entry.state = DiffState {
                old_state: baseline,
                new_state: snapshot,
                computed_state: computed,
                is_diff_mode,
            };
            entry.history.push(entry.state.to_snapshot());
            debug!(
                key,
                diff_mode = is_diff_mode,
                history = entry.history.len(),
                "applied new snapshot"
            );
            self.outbox.push(entry.publication(key))?;
        }
        self.flush()?;
        Ok(true)
    }

    // ---- Resolution ----

    /// Accept every diff under `path`, locating array elements with
    /// `identify`.
    ///
    /// Returns `Ok(false)` if the key is unknown, not in diff mode, the path
    /// does not exist, or there was nothing to accept under it. A malformed
    /// path is an error only for a registered key.
    pub fn accept_diff(&self, key: &str, path: &str, identify: impl Into<IdRule>) -> EngineResult<bool> {
        let Some(path) = self.parse_for(key, path)? else {
            return Ok(false);
        };
        self.resolve(key, &path, Some(identify.into()), Resolution::Accept)
    }

    /// Reject every diff under `path`, reverting against the baseline.
    ///
    /// Same return contract as [`DiffEngine::accept_diff`].
    pub fn reject_diff(&self, key: &str, path: &str, identify: impl Into<IdRule>) -> EngineResult<bool> {
        let Some(path) = self.parse_for(key, path)? else {
            return Ok(false);
        };
        self.resolve(key, &path, Some(identify.into()), Resolution::Reject)
    }

    /// Accept every diff of `key`, wherever its markers sit.
    pub fn accept_all_diffs(&self, key: &str) -> EngineResult<bool> {
        self.resolve(key, &JsonPath::root(), None, Resolution::Accept)
    }

    /// Reject every diff of `key`, wherever its markers sit.
    pub fn reject_all_diffs(&self, key: &str) -> EngineResult<bool> {
        self.resolve(key, &JsonPath::root(), None, Resolution::Reject)
    }

    /// Parse `path` for a resolution on `key`; `None` if the key is not
    /// registered.
    fn parse_for(&self, key: &str, path: &str) -> EngineResult<Option<JsonPath>> {
        if self.read_entry(key, |_| ()).is_none() {
            debug!(key, "resolution on unregistered key ignored");
            return Ok(None);
        }
        Ok(Some(JsonPath::parse(path)?))
    }

    fn resolve(
        &self,
        key: &str,
        path: &JsonPath,
        rule: Option<IdRule>,
        resolution: Resolution,
    ) -> EngineResult<bool> {
        {
            let mut entries = self.write()?;
            let Some(entry) = entries.get_mut(key) else {
                debug!(key, "resolution on unregistered key ignored");
                return Ok(false);
            };
            if !entry.state.is_diff_mode {
                debug!(key, "resolution outside diff mode ignored");
                return Ok(false);
            }

            let rule = rule.unwrap_or_else(|| entry.rule.clone());
            let mut computed = entry.state.computed_state.clone();
            if !resolve_at(&mut computed, &entry.state.old_state, path, &rule, resolution) {
                return Ok(false);
            }
            if computed == entry.state.computed_state {
                debug!(key, %path, "nothing to resolve under path");
                return Ok(false);
            }

            entry.state.is_diff_mode = contains_markers(&computed);
            entry.state.computed_state = computed;
            entry.history.replace_current(entry.state.to_snapshot());
            debug!(
                key,
                %path,
                resolution = resolution.as_str(),
                diff_mode = entry.state.is_diff_mode,
                "resolved diffs"
            );
            self.outbox.push(entry.publication(key))?;
        }
        self.flush()?;
        Ok(true)
    }

    // ---- History ----

    /// Step `key` back one history entry.
    ///
    /// Returns the restored computed state, or `Ok(None)` if the key is
    /// unknown or already at its earliest entry.
    pub fn undo(&self, key: &str) -> EngineResult<Option<Value>> {
        self.travel(key, HistoryStack::undo, "undo")
    }

    /// Re-apply the most recently undone entry of `key`.
    ///
    /// Returns the restored computed state, or `Ok(None)` if there is
    /// nothing to redo.
    pub fn redo(&self, key: &str) -> EngineResult<Option<Value>> {
        self.travel(key, HistoryStack::redo, "redo")
    }

    fn travel(
        &self,
        key: &str,
        step: fn(&mut HistoryStack) -> Option<&Snapshot>,
        direction: &'static str,
    ) -> EngineResult<Option<Value>> {
        let restored = {
            let mut entries = self.write()?;
            let Some(entry) = entries.get_mut(key) else {
                return Ok(None);
            };
            let Some(snapshot) = step(&mut entry.history) else {
                debug!(key, direction, "history boundary reached");
                return Ok(None);
            };
            entry.state = DiffState::from_snapshot(snapshot);
            debug!(key, direction, diff_mode = entry.state.is_diff_mode, "history moved");
            self.outbox.push(entry.publication(key))?;
            entry.state.computed_state.clone()
        };
        self.flush()?;
        Ok(Some(restored))
    }
}

impl std::fmt::Debug for DiffEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffEngine")
            .field("config", &self.config)
            .field("keys", &self.keys())
            .finish()
    }
}

fn check_shape(key: &str, baseline: &Value, snapshot: &Value) -> EngineResult<()> {
    if baseline.is_null() || snapshot.is_null() {
        return Ok(());
    }
    let (expected, actual) = (kind_name(baseline), kind_name(snapshot));
    if expected != actual {
        return Err(EngineError::ShapeMismatch {
            key: key.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}
