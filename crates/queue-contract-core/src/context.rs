//! The persisted queue aggregate.

use crate::error::QueueError;
use crate::item::{null_as_default, Item, ItemId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed key under which the whole aggregate is stored
pub const CONTEXT_KEY: &str = "QueueContext";

/// How Peek and Update learn which filters and sorts are active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Filters and sorts are named by each request
    #[default]
    PerRequest,
    /// Filter and sort names are kept in the aggregate between requests
    Standing,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerRequest => f.write_str("per_request"),
            Self::Standing => f.write_str("standing"),
        }
    }
}

/// The single object holding every queued item.
///
/// `filters` and `sorts` are only populated in [`SelectionMode::Standing`].
/// A `null` list decodes as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueContext {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Item>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sorts: Vec<String>,
}

impl QueueContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an aggregate read from the state store
    pub fn from_bytes(raw: &[u8]) -> Result<Self, QueueError> {
        serde_json::from_slice(raw).map_err(QueueError::Corrupted)
    }

    /// Encode the aggregate for the state store
    pub fn to_bytes(&self) -> Result<Bytes, QueueError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(QueueError::Encoding)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    /// Remove the item with `id`, keeping the relative order of the rest
    pub fn take(&mut self, id: &ItemId) -> Option<Item> {
        let position = self.items.iter().position(|item| &item.id == id)?;
        Some(self.items.remove(position))
    }

    /// Whether standing filter or sort names are stored
    pub fn has_standing_selection(&self) -> bool {
        !self.filters.is_empty() || !self.sorts.is_empty()
    }

    pub fn add_filter(&mut self, name: &str) {
        self.filters.push(name.to_string());
    }

    /// Remove every occurrence of `name`; returns how many were removed
    pub fn remove_filter(&mut self, name: &str) -> usize {
        remove_all(&mut self.filters, name)
    }

    pub fn add_sort(&mut self, name: &str) {
        self.sorts.push(name.to_string());
    }

    /// Remove every occurrence of `name`; returns how many were removed
    pub fn remove_sort(&mut self, name: &str) -> usize {
        remove_all(&mut self.sorts, name)
    }
}

fn remove_all(names: &mut Vec<String>, name: &str) -> usize {
    let before = names.len();
    names.retain(|n| n != name);
    before - names.len()
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
