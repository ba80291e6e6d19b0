//! # Queue Contract Core
//!
//! A persisted, extensible priority-queue engine. Items carrying arbitrary
//! JSON payloads are kept in a single aggregate stored under one key of an
//! external versioned key-value store.
//!
//! The engine supports:
//! - Batch insertion with pluggable, all-or-nothing payload validation
//! - Extraction of exactly one item chosen by named filters and sorts
//! - Bulk replacement of payloads for items matching named filters
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions
//! - Filters, sorts and validators are injected by the deployment through
//!   [`Extensions`]
//! - The store is reached through [`StatePort`]; concurrency control belongs
//!   to the store
//!
//! ## Module Organization
//!
//! - [`item`] - Items and payloads
//! - [`context`] - The persisted aggregate
//! - [`extensions`] - Filter, sort and validator registries
//! - [`engine`] - Init, Put, Peek and Update
//! - [`state`] - The state store port
//! - [`adapters`] - In-memory and filesystem state stores
//!
//! ## Usage
//!
//! ```rust
//! use queue_contract_core::{ItemId, SelectionSpec};
//!
//! let id = ItemId::new();
//! let spec = SelectionSpec::parse(r#"{"byIds": ["a", "b"]}"#).unwrap();
//! assert_eq!(spec.names(), vec!["byIds"]);
//! # let _ = id;
//! ```

pub mod adapters;
pub mod context;
pub mod engine;
pub mod error;
pub mod extensions;
pub mod item;
pub mod state;

pub use context::{QueueContext, SelectionMode, CONTEXT_KEY};
pub use engine::QueueEngine;
pub use error::{QueueError, RegistryError, ValidationFailure, ValidationReport};
pub use extensions::{
    ActiveFilter, ActiveSort, ActiveValidator, ExtensionRegistry, Extensions, ItemFilter, ItemSort,
    PayloadValidator, SelectionEntry, SelectionSpec,
};
pub use item::{Item, ItemId, NewItem, Payload};
pub use state::{StateError, StatePort};

/// Standard result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
