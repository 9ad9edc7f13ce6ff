//! State registry for revise.
//!
//! The registry is the process-wide keyed store that holds the externally
//! visible value of every tracked state. The diff engine publishes each new
//! computed state into it; renderers read values from it and subscribe to
//! be told when a value changes.
//!
//! # Modules
//!
//! - [`error`] -- Error types for registry operations
//! - [`types`] -- [`Change`], [`Listener`] and [`SubscriptionId`]
//! - [`traits`] -- The [`StateRegistry`] trait defining the store interface
//! - [`memory`] -- In-memory [`InMemoryRegistry`]

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{RegistryError, Result};
pub use memory::InMemoryRegistry;
pub use traits::StateRegistry;
pub use types::{Change, Listener, SubscriptionId};
