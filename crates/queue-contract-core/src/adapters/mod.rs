//! # State Store Adapters
//!
//! Implementations of the [`StatePort`](crate::state::StatePort) interface.

pub mod filesystem_state;
pub mod memory_state;

pub use filesystem_state::FilesystemStateStore;
pub use memory_state::{InMemoryStateStore, StateTransaction};
