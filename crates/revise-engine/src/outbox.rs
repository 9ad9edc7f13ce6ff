//! Ordered delivery of committed states to setters and the registry.
//!
//! Publications are queued while the engine lock is held, so queue order is
//! commit order. Delivery runs outside that lock and one thread at a time:
//! the caller that finds the outbox idle drains it, and a caller committing
//! while a drain is in progress (another thread, or a listener calling back
//! into the engine) leaves its publication to that drain.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use revise_registry::StateRegistry;
use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::state::Setter;

pub(crate) enum Publication {
    Set {
        key: String,
        computed: Value,
        setter: Option<Setter>,
    },
    Remove {
        key: String,
    },
}

impl Publication {
    fn deliver(self, registry: &dyn StateRegistry) -> EngineResult<()> {
        match self {
            Self::Set {
                key,
                computed,
                setter,
            } => {
                if let Some(setter) = setter {
                    setter(&computed);
                }
                registry.set(&key, computed)?;
                debug!(key, "published computed state");
            }
            Self::Remove { key } => {
                registry.remove(&key)?;
                debug!(key, "removed published state");
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<Publication>,
    draining: bool,
}

#[derive(Default)]
pub(crate) struct Outbox {
    queue: Mutex<Queue>,
}

impl Outbox {
    fn lock(&self) -> EngineResult<MutexGuard<'_, Queue>> {
        self.queue
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))
    }

    pub(crate) fn push(&self, publication: Publication) -> EngineResult<()> {
        self.lock()?.pending.push_back(publication);
        Ok(())
    }

    /// Deliver everything queued, in order. Returns immediately if another
    /// call is already draining. The first delivery error is returned after
    /// the queue is empty.
    pub(crate) fn drain(&self, registry: &dyn StateRegistry) -> EngineResult<()> {
        {
            let mut queue = self.lock()?;
            if queue.draining {
                return Ok(());
            }
            queue.draining = true;
        }
        let _unwind = ResetOnUnwind(self);

        let mut first_error = None;
        loop {
            let next = {
                let mut queue = self.lock()?;
                match queue.pending.pop_front() {
                    Some(publication) => publication,
                    None => {
                        queue.draining = false;
                        break;
                    }
                }
            };
            if let Err(e) = next.deliver(registry) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Releases the draining flag if a setter or listener panics mid-delivery.
struct ResetOnUnwind<'a>(&'a Outbox);

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Ok(mut queue) = self.0.queue.lock() {
                queue.draining = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revise_registry::InMemoryRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn set(key: &str, value: Value) -> Publication {
        Publication::Set {
            key: key.to_string(),
            computed: value,
            setter: None,
        }
    }

    #[test]
    fn drains_in_push_order() {
        let registry = InMemoryRegistry::new();
        let outbox = Outbox::default();
        outbox.push(set("k", json!(1))).unwrap();
        outbox.push(set("k", json!(2))).unwrap();
        outbox.drain(&registry).unwrap();
        assert_eq!(registry.get("k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn remove_is_delivered() {
        let registry = InMemoryRegistry::new();
        let outbox = Outbox::default();
        outbox.push(set("k", json!(1))).unwrap();
        outbox
            .push(Publication::Remove {
                key: "k".to_string(),
            })
            .unwrap();
        outbox.drain(&registry).unwrap();
        assert!(registry.get("k").unwrap().is_none());
    }

    #[test]
    fn publications_queued_during_delivery_are_drained() {
        let registry = InMemoryRegistry::new();
        let outbox = Arc::new(Outbox::default());
        let reentrant = outbox.clone();
        let setter: Setter = Arc::new(move |_: &Value| {
            reentrant.push(set("k", json!("second"))).unwrap();
        });
        outbox
            .push(Publication::Set {
                key: "k".to_string(),
                computed: json!("first"),
                setter: Some(setter),
            })
            .unwrap();
        outbox.drain(&registry).unwrap();
        assert_eq!(registry.get("k").unwrap(), Some(json!("second")));
    }

    #[test]
    fn delivery_error_does_not_strand_the_queue() {
        let registry = InMemoryRegistry::new();
        let outbox = Outbox::default();
        outbox.push(set("", json!(1))).unwrap();
        outbox.push(set("k", json!(2))).unwrap();
        assert!(outbox.drain(&registry).is_err());
        assert_eq!(registry.get("k").unwrap(), Some(json!(2)));
        outbox.push(set("k", json!(3))).unwrap();
        outbox.drain(&registry).unwrap();
        assert_eq!(registry.get("k").unwrap(), Some(json!(3)));
    }
}
