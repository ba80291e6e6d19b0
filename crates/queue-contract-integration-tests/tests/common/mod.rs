//! Common test utilities for queue-contract integration tests
//!
//! This module provides:
//! - A registry with numeric filters, sorts and a payload validator
//! - Engine and store builders
//! - State port doubles that count or refuse calls

use async_trait::async_trait;
use bytes::Bytes;
use queue_contract_core::adapters::InMemoryStateStore;
use queue_contract_core::{
    ExtensionRegistry, Item, ItemId, NewItem, Payload, QueueContext, QueueEngine, SelectionMode,
    SelectionSpec, StateError, StatePort, CONTEXT_KEY,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

/// Registry with `even`, `odd`, `above`, `byIds`, `desc`, `asc` and a
/// `ValueItem` validator requiring a numeric `value`
#[allow(dead_code)]
pub fn numeric_registry() -> ExtensionRegistry {
    let mut registry = ExtensionRegistry::new();
    registry
        .register_filter("even", |item: &Item, _: &[Value]| {
            value_of(item).map_or(false, |v| v % 2 == 0)
        })
        .register_filter("odd", |item: &Item, _: &[Value]| {
            value_of(item).map_or(false, |v| v % 2 != 0)
        })
        .register_filter("above", |item: &Item, args: &[Value]| {
            let threshold = args.first().and_then(Value::as_i64).unwrap_or(0);
            value_of(item).map_or(false, |v| v > threshold)
        })
        .register_filter("byIds", |item: &Item, args: &[Value]| {
            args.iter().any(|arg| arg.as_str() == Some(item.id.as_str()))
        })
        .register_sort("desc", |a: &Item, b: &Item, _: &[Value]| {
            value_of(a).unwrap_or(i64::MIN) > value_of(b).unwrap_or(i64::MIN)
        })
        .register_sort("asc", |a: &Item, b: &Item, _: &[Value]| {
            value_of(a).unwrap_or(i64::MAX) < value_of(b).unwrap_or(i64::MAX)
        })
        .register_validator("ValueItem", |data: &Payload| {
            match data.get("value") {
                Some(v) if v.is_number() => Ok(()),
                _ => Err("\"value\" field is missing".to_string()),
            }
        });
    registry
}

#[allow(dead_code)]
pub fn engine() -> QueueEngine {
    QueueEngine::new(Arc::new(numeric_registry()))
}

#[allow(dead_code)]
pub fn standing_engine() -> QueueEngine {
    engine().with_mode(SelectionMode::Standing)
}

#[allow(dead_code)]
pub fn valued(value: i64) -> NewItem {
    NewItem::new(payload(json!({ "value": value })))
}

#[allow(dead_code)]
pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

#[allow(dead_code)]
pub fn value_of(item: &Item) -> Option<i64> {
    item.number("value").map(|v| v as i64)
}

#[allow(dead_code)]
pub fn none() -> SelectionSpec {
    SelectionSpec::new()
}

#[allow(dead_code)]
pub fn names(names: &[&str]) -> SelectionSpec {
    SelectionSpec::from_names(names.iter().copied())
}

#[allow(dead_code)]
pub fn by_ids(ids: &[ItemId]) -> SelectionSpec {
    SelectionSpec::new().with("byIds", ids.iter().map(|id| json!(id.as_str())).collect())
}

/// Initialize a queue and insert the given values in order
#[allow(dead_code)]
pub async fn seeded(engine: &QueueEngine, values: &[i64]) -> (InMemoryStateStore, Vec<ItemId>) {
    let store = InMemoryStateStore::new();
    engine.init(&store).await.unwrap();
    let ids = if values.is_empty() {
        Vec::new()
    } else {
        engine
            .put(&store, values.iter().copied().map(valued).collect())
            .await
            .unwrap()
    };
    (store, ids)
}

#[allow(dead_code)]
pub async fn stored_context(state: &dyn StatePort) -> QueueContext {
    let raw = state.get(CONTEXT_KEY).await.unwrap().unwrap();
    QueueContext::from_bytes(&raw).unwrap()
}

#[allow(dead_code)]
pub async fn stored_values(state: &dyn StatePort) -> Vec<i64> {
    stored_context(state)
        .await
        .items
        .iter()
        .filter_map(value_of)
        .collect()
}

/// Extract items until the queue yields nothing, returning their values
#[allow(dead_code)]
pub async fn drain(
    engine: &QueueEngine,
    state: &dyn StatePort,
    sorts: &SelectionSpec,
    filters: &SelectionSpec,
) -> Vec<i64> {
    let mut values = Vec::new();
    while let Some(item) = engine.peek(state, sorts, filters).await.unwrap() {
        values.push(value_of(&item).unwrap_or_default());
    }
    values
}

// ============================================================================
// State Port Doubles
// ============================================================================

/// State port that counts calls and delegates to an in-memory store
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct CountingStatePort {
    pub inner: InMemoryStateStore,
    gets: Arc<AtomicUsize>,
    puts: Arc<AtomicUsize>,
}

impl CountingStatePort {
    #[allow(dead_code)]
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatePort for CountingStatePort {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StateError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StateError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value).await
    }
}

/// State port whose writes always fail
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct ReadOnlyStatePort {
    pub inner: InMemoryStateStore,
}

#[async_trait]
impl StatePort for ReadOnlyStatePort {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StateError> {
        self.inner.get(key).await
    }

    async fn put(&self, _key: &str, _value: Bytes) -> Result<(), StateError> {
        Err(StateError::Unavailable {
            message: "store is read-only".to_string(),
        })
    }
}
