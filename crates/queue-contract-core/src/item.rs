//! Item and payload types stored in the queue.

use crate::error::QueueError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment-defined structured data carried by an item.
///
/// The engine never looks inside a payload; only validators and filters do.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Decode an explicit JSON `null` the same way as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ============================================================================
// ItemId
// ============================================================================

/// Identifier assigned to an item by the engine when it is inserted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a new random item ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get item ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(QueueError::MalformedRequest {
                message: "item id must not be empty".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

impl PartialEq<str> for ItemId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

// ============================================================================
// Item
// ============================================================================

/// A unit of data held by the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Payload,
}

impl Item {
    /// Create an item with a freshly generated ID
    pub fn new(data: Payload) -> Self {
        Self {
            id: ItemId::new(),
            data,
        }
    }

    /// Look up a top-level payload field
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Read a top-level payload field as a number
    pub fn number(&self, key: &str) -> Option<f64> {
        self.field(key).and_then(serde_json::Value::as_f64)
    }
}

/// An item submitted to `Put`, before the engine assigns its ID.
///
/// Any `id` present in the submitted JSON is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Payload,
}

impl NewItem {
    pub fn new(data: Payload) -> Self {
        Self { data }
    }

    /// Attach a fresh identifier, turning the submission into a stored item
    pub(crate) fn into_item(self) -> Item {
        Item::new(self.data)
    }
}

impl From<Payload> for NewItem {
    fn from(data: Payload) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
