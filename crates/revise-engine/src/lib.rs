//! Diff state engine for revise.
//!
//! Tracks named pieces of application state across successive snapshots.
//! Each new snapshot is diffed against the current state, the differences
//! are annotated with `diff` markers, and callers accept or reject them,
//! down to a single record inside a nested collection, while an undo/redo
//! history of finalized steps is kept per key.
//!
//! This is the main entry point for applications embedding revise.

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
mod outbox;
pub mod state;

pub use config::EngineConfig;
pub use engine::DiffEngine;
pub use error::{EngineError, EngineResult};
pub use history::{HistoryStack, Snapshot};
pub use state::{DiffHistoryState, DiffState, Registration, Setter};

// Re-export key types
pub use revise_diff::{ComputeState, DiffSummary, RecordArrayDiff, RemovedPlacement};
pub use revise_registry::{InMemoryRegistry, StateRegistry};
pub use revise_types::{DiffMarker, IdRule, JsonPath, RecordId};
