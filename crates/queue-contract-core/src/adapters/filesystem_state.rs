//! # Filesystem State Store
//!
//! Local filesystem implementation of [`StatePort`] for development and the
//! command-line host. Each key is stored as one file under a base directory.

use crate::state::{StateError, StatePort};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

#[cfg(test)]
#[path = "filesystem_state_tests.rs"]
mod tests;

/// Filesystem-based state store
///
/// Writes go to a uniquely named temporary file in the base directory that is
/// then renamed over the target, so a reader never observes a half-written
/// value and concurrent writers never share a temporary file.
///
/// There is no version check: two processes that read the same value and
/// both write it back are not detected, and the last rename wins. Callers
/// that race on one directory must serialize access themselves.
///
/// # Examples
///
/// ```no_run
/// use queue_contract_core::adapters::FilesystemStateStore;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FilesystemStateStore::new(PathBuf::from("./.queue-contract")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemStateStore {
    base_path: PathBuf,
}

impl FilesystemStateStore {
    /// Create new filesystem state store
    ///
    /// # Errors
    ///
    /// Returns error if the base directory cannot be created.
    pub async fn new(base_path: PathBuf) -> Result<Self, StateError> {
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File holding the value of `key`
    fn key_path(&self, key: &str) -> Result<PathBuf, StateError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StateError::InvalidKey {
                key: key.to_string(),
            });
        }

        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl StatePort for FilesystemStateStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StateError> {
        let path = self.key_path(key)?;
        match fs::read(&path).await {
            Ok(contents) => Ok(Some(Bytes::from(contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::Io(e)),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StateError> {
        let path = self.key_path(key)?;
        let base_path = self.base_path.clone();
        let size = value.len();

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&base_path, &target, &value))
            .await
            .map_err(|e| StateError::Io(std::io::Error::other(e)))??;

        debug!(key = %key, path = %path.display(), size, "State written");
        Ok(())
    }
}

/// Write `value` to a fresh temporary file beside `target` and rename it into
/// place. The temporary file is removed if any step fails.
fn write_atomically(base_path: &Path, target: &Path, value: &[u8]) -> Result<(), StateError> {
    let mut file = NamedTempFile::new_in(base_path)?;
    file.write_all(value)?;
    file.as_file().sync_all()?;
    file.persist(target).map_err(|e| StateError::Io(e.error))?;
    Ok(())
}
