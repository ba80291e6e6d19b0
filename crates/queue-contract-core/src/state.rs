//! # State Port
//!
//! The narrow get/put-bytes interface through which the engine reads and
//! writes the queue aggregate.
//!
//! Implementations are expected to sit inside a transaction boundary owned by
//! the host: every engine operation issues exactly one `get` and at most one
//! `put`, and atomicity/conflict detection across concurrent invocations is
//! the store's responsibility. A store that detects a concurrent modification
//! reports [`StateError::Conflict`]; the caller decides whether to retry.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Interface to the external transactional key-value store
///
/// # Examples
///
/// ```no_run
/// use queue_contract_core::state::{StateError, StatePort};
/// # async fn example(state: &dyn StatePort) -> Result<(), StateError> {
/// state.put("QueueContext", bytes::Bytes::from_static(b"{}")).await?;
/// if let Some(raw) = state.get("QueueContext").await? {
///     println!("{} bytes stored", raw.len());
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait StatePort: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing is stored
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StateError>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StateError>;
}

/// Failures reported by a state store
#[derive(Debug, Error)]
pub enum StateError {
    #[error("write conflict on key '{key}': value changed since it was read")]
    Conflict { key: String },

    #[error("state store unavailable: {message}")]
    Unavailable { message: String },

    #[error("invalid state key '{key}'")]
    InvalidKey { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StateError {
    /// Check if the failed operation can be retried from a fresh read
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Unavailable { .. } => true,
            Self::InvalidKey { .. } => false,
            Self::Io(_) => false,
        }
    }
}
