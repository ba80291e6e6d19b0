//! # In-Memory State Store
//!
//! Thread-safe, versioned key-value store implementing [`StatePort`] for
//! tests and development.
//!
//! Direct `get`/`put` calls on [`InMemoryStateStore`] commit immediately.
//! [`InMemoryStateStore::begin`] opens a [`StateTransaction`] with optimistic
//! concurrency control: it remembers the version of every key it reads,
//! buffers its writes, and refuses to commit if any key it read has been
//! written by someone else in the meantime.

use crate::state::{StateError, StatePort};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

#[cfg(test)]
#[path = "memory_state_tests.rs"]
mod tests;

#[derive(Debug, Clone)]
struct VersionedValue {
    value: Bytes,
    version: u64,
}

/// Versioned in-memory key-value store
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    entries: Arc<RwLock<HashMap<String, VersionedValue>>>,
}

impl InMemoryStateStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction reading from the current committed state
    pub fn begin(&self) -> StateTransaction {
        StateTransaction {
            store: self.clone(),
            reads: Mutex::new(HashMap::new()),
            writes: Mutex::new(HashMap::new()),
        }
    }

    /// Committed version of `key`; `0` when the key was never written
    pub fn version(&self, key: &str) -> Result<u64, StateError> {
        Ok(self.read_versioned(key)?.1)
    }

    fn read_versioned(&self, key: &str) -> Result<(Option<Bytes>, u64), StateError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(match entries.get(key) {
            Some(entry) => (Some(entry.value.clone()), entry.version),
            None => (None, 0),
        })
    }

    fn write_versioned(&self, key: &str, value: Bytes) -> Result<u64, StateError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(apply_write(&mut entries, key, value))
    }
}

#[async_trait]
impl StatePort for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StateError> {
        Ok(self.read_versioned(key)?.0)
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StateError> {
        self.write_versioned(key, value)?;
        Ok(())
    }
}

/// A unit of work against an [`InMemoryStateStore`].
///
/// Dropping a transaction without calling [`commit`](Self::commit) discards
/// its writes.
#[derive(Debug)]
pub struct StateTransaction {
    store: InMemoryStateStore,
    /// Version of each key at the time it was first read
    reads: Mutex<HashMap<String, u64>>,
    writes: Mutex<HashMap<String, Bytes>>,
}

impl StateTransaction {
    /// Publish buffered writes.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Conflict`] if any key read by this transaction
    /// was committed by another writer after the read. Nothing is written in
    /// that case.
    pub fn commit(self) -> Result<(), StateError> {
        let reads = self.reads.into_inner().map_err(|_| poisoned())?;
        let writes = self.writes.into_inner().map_err(|_| poisoned())?;

        let mut entries = self.store.entries.write().map_err(|_| poisoned())?;
        for (key, read_version) in &reads {
            let current = entries.get(key).map_or(0, |entry| entry.version);
            if current != *read_version {
                debug!(key = %key, read_version, current, "Rejecting stale transaction");
                return Err(StateError::Conflict { key: key.clone() });
            }
        }

        for (key, value) in writes {
            apply_write(&mut entries, &key, value);
        }
        Ok(())
    }
}

#[async_trait]
impl StatePort for StateTransaction {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StateError> {
        if let Some(pending) = self.writes.lock().map_err(|_| poisoned())?.get(key) {
            return Ok(Some(pending.clone()));
        }

        let (value, version) = self.store.read_versioned(key)?;
        self.reads
            .lock()
            .map_err(|_| poisoned())?
            .entry(key.to_string())
            .or_insert(version);
        Ok(value)
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StateError> {
        self.writes
            .lock()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), value);
        Ok(())
    }
}

fn apply_write(entries: &mut HashMap<String, VersionedValue>, key: &str, value: Bytes) -> u64 {
    let version = entries.get(key).map_or(0, |entry| entry.version) + 1;
    entries.insert(key.to_string(), VersionedValue { value, version });
    version
}

fn poisoned() -> StateError {
    StateError::Unavailable {
        message: "state store lock poisoned".to_string(),
    }
}
