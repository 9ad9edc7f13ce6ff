//! Foundation types for revise.
//!
//! This crate provides the small vocabulary shared by every other revise
//! crate: how a diff marker is spelled, how a record is identified across
//! snapshots, and how a location inside a snapshot is addressed.
//!
//! # Key Types
//!
//! - [`DiffMarker`] -- `added` / `changed` / `removed` tag carried in a `diff` field
//! - [`RecordId`] -- Identity of a record within a collection
//! - [`IdRule`] -- Field name or closure that yields a [`RecordId`]
//! - [`JsonPath`] -- `/`-separated pointer into a `serde_json::Value`

pub mod error;
pub mod identity;
pub mod marker;
pub mod path;

pub use error::TypeError;
pub use identity::{IdRule, RecordId};
pub use marker::{DiffMarker, MARKER_FIELD};
pub use path::{element_index, JsonPath};
