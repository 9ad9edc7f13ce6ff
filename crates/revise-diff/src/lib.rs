//! Diff engine for revise.
//!
//! Compares successive JSON snapshots of a record collection, annotates the
//! differences in place with `diff` markers, and resolves those markers by
//! accepting or rejecting them under a path.
//!
//! # Key Types
//!
//! - [`RecordMatch`] / [`MatchKind`] -- Identity matching between two collections
//! - [`annotate_records`] / [`RemovedPlacement`] -- Marker annotation
//! - [`ComputeState`] / [`RecordArrayDiff`] -- Pluggable `(old, new) -> computed` strategies
//! - [`accept_at`] / [`reject_at`] -- Path-scoped resolution
//! - [`DiffSummary`] -- Marker counts

pub mod annotate;
pub mod error;
pub mod markers;
pub mod matcher;
pub mod resolve;
pub mod strategy;
pub mod summary;

pub use annotate::{annotate_records, AnnotateOptions, RemovedPlacement};
pub use error::{kind_name, DiffError, DiffResult};
pub use markers::{contains_markers, element_marker, strip_markers, stripped};
pub use matcher::{match_records, MatchEntry, MatchKind, RecordMatch};
pub use resolve::{accept_all, accept_at, reject_all, reject_at, resolve_at, Resolution};
pub use strategy::{ComputeState, RecordArrayDiff};
pub use summary::DiffSummary;
