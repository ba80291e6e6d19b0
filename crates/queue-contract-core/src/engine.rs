//! # Queue Engine
//!
//! Executes Init, Put, Peek and Update against the aggregate stored behind a
//! [`StatePort`], using an injected [`Extensions`] registry for validation,
//! filtering and ordering.
//!
//! Every operation is one read-modify-write: a single `get` of the aggregate
//! and at most one `put`. The engine holds no state between calls and never
//! retries; conflicts reported by the store surface as retryable errors.

use crate::context::{QueueContext, SelectionMode, CONTEXT_KEY};
use crate::error::{QueueError, ValidationFailure, ValidationReport};
use crate::extensions::{ActiveFilter, ActiveSort, Extensions, SelectionSpec};
use crate::item::{Item, ItemId, NewItem, Payload};
use crate::state::StatePort;
use crate::QueueResult;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

/// The queue engine.
///
/// # Examples
///
/// ```rust
/// use queue_contract_core::{
///     adapters::InMemoryStateStore, ExtensionRegistry, NewItem, QueueEngine, SelectionSpec,
/// };
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryStateStore::new();
/// let engine = QueueEngine::new(Arc::new(ExtensionRegistry::new()));
///
/// engine.init(&store).await.unwrap();
/// let ids = engine.put(&store, vec![NewItem::default()]).await.unwrap();
///
/// let none = SelectionSpec::new();
/// let item = engine.peek(&store, &none, &none).await.unwrap().unwrap();
/// assert_eq!(item.id, ids[0]);
/// # });
/// ```
#[derive(Clone)]
pub struct QueueEngine {
    extensions: Arc<dyn Extensions>,
    mode: SelectionMode,
}

impl QueueEngine {
    /// Create an engine in [`SelectionMode::PerRequest`]
    pub fn new(extensions: Arc<dyn Extensions>) -> Self {
        Self {
            extensions,
            mode: SelectionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    // ------------------------------------------------------------------------
    // Init
    // ------------------------------------------------------------------------

    /// Install an empty aggregate, discarding whatever was stored before
    #[instrument(skip_all, fields(operation = "Init"))]
    pub async fn init(&self, state: &dyn StatePort) -> QueueResult<()> {
        self.store(state, &QueueContext::new())
            .await
            .map_err(|e| e.within("Init"))?;

        info!("Queue context initialized");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Put
    // ------------------------------------------------------------------------

    /// Validate and append a batch of items.
    ///
    /// Returns the assigned IDs in submission order. If any validator rejects
    /// any item the whole batch is refused and the aggregate is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ValidationFailed`] listing every failing
    /// (validator, item) pair, or a state error from the store.
    #[instrument(skip_all, fields(operation = "Put", batch_size = items.len()))]
    pub async fn put(&self, state: &dyn StatePort, items: Vec<NewItem>) -> QueueResult<Vec<ItemId>> {
        self.put_inner(state, items)
            .await
            .map_err(|e| e.within("Put"))
    }

    async fn put_inner(&self, state: &dyn StatePort, items: Vec<NewItem>) -> QueueResult<Vec<ItemId>> {
        if items.is_empty() {
            return Err(QueueError::MalformedRequest {
                message: "at least one item is required".to_string(),
            });
        }

        self.validate(&items)?;

        let mut context = self.load(state).await?;
        let mut ids = Vec::with_capacity(items.len());
        for submitted in items {
            let mut item = submitted.into_item();
            while context.contains(&item.id) {
                item.id = ItemId::new();
            }
            ids.push(item.id.clone());
            context.items.push(item);
        }

        self.store(state, &context).await?;

        info!(inserted = ids.len(), total = context.len(), "Items added to queue");
        Ok(ids)
    }

    fn validate(&self, items: &[NewItem]) -> QueueResult<()> {
        let validators = self.extensions.validators()?;

        let mut report = ValidationReport::new();
        for validator in &validators {
            for (index, item) in items.iter().enumerate() {
                if let Err(reason) = validator.validator.validate(&item.data) {
                    report.push(ValidationFailure {
                        validator: validator.name.clone(),
                        item_index: index,
                        reason,
                    });
                }
            }
        }

        if !report.is_empty() {
            warn!(failures = report.len(), "Rejected batch failing validation");
        }
        report.into_result()
    }

    // ------------------------------------------------------------------------
    // Peek
    // ------------------------------------------------------------------------

    /// Remove and return the best item matching the selection.
    ///
    /// Items must satisfy every filter. Each sort then reorders the eligible
    /// items on its own, so the last sort decides which item comes first;
    /// items the last sort considers equal keep insertion order. With no sort
    /// the oldest eligible item wins.
    ///
    /// Returns `Ok(None)` and leaves the aggregate untouched when nothing
    /// matches.
    #[instrument(skip_all, fields(operation = "Peek", sorts = sorts.len(), filters = filters.len()))]
    pub async fn peek(
        &self,
        state: &dyn StatePort,
        sorts: &SelectionSpec,
        filters: &SelectionSpec,
    ) -> QueueResult<Option<Item>> {
        self.peek_inner(state, sorts, filters)
            .await
            .map_err(|e| e.within("Peek"))
    }

    async fn peek_inner(
        &self,
        state: &dyn StatePort,
        sorts: &SelectionSpec,
        filters: &SelectionSpec,
    ) -> QueueResult<Option<Item>> {
        self.require_call_time_selection("Peek", &[sorts, filters])?;

        let mut context = self.load(state).await?;
        let (filters, sorts) = self.resolve(&context, filters, sorts)?;

        let candidates = eligible(&context.items, &filters);
        let chosen = match head(&candidates, &sorts) {
            Some(item) => item.id.clone(),
            None => {
                debug!(queued = context.len(), "No item matched selection");
                return Ok(None);
            }
        };

        let item = context.take(&chosen);
        self.store(state, &context).await?;

        info!(item_id = %chosen, remaining = context.len(), "Item extracted from queue");
        Ok(item)
    }

    // ------------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------------

    /// Replace the payload of every item matching all filters.
    ///
    /// The payload is replaced in full, not merged. Returns how many items
    /// were replaced. In standing mode a non-empty `filters` spec takes the
    /// place of the stored filters for this call.
    #[instrument(skip_all, fields(operation = "Update", filters = filters.len()))]
    pub async fn update(
        &self,
        state: &dyn StatePort,
        data: Payload,
        filters: &SelectionSpec,
    ) -> QueueResult<usize> {
        self.update_inner(state, data, filters)
            .await
            .map_err(|e| e.within("Update"))
    }

    async fn update_inner(
        &self,
        state: &dyn StatePort,
        data: Payload,
        filters: &SelectionSpec,
    ) -> QueueResult<usize> {
        let mut context = self.load(state).await?;
        let filters = match self.mode {
            SelectionMode::Standing if !filters.is_empty() => self.extensions.filters(filters)?,
            _ => self.resolve(&context, filters, &SelectionSpec::new())?.0,
        };

        let mut matched = 0;
        for item in context
            .items
            .iter_mut()
            .filter(|item| filters.iter().all(|f| f.matches(item)))
        {
            item.data = data.clone();
            matched += 1;
        }

        self.store(state, &context).await?;

        info!(matched, "Item payloads replaced");
        Ok(matched)
    }

    // ------------------------------------------------------------------------
    // Standing selection
    // ------------------------------------------------------------------------

    /// Append a filter name to the standing selection
    #[instrument(skip_all, fields(operation = "AddFilter", filter = %name))]
    pub async fn add_filter(&self, state: &dyn StatePort, name: &str) -> QueueResult<()> {
        self.edit_standing(state, "AddFilter", |context| context.add_filter(name))
            .await
    }

    /// Remove every occurrence of a filter name from the standing selection
    #[instrument(skip_all, fields(operation = "RemoveFilter", filter = %name))]
    pub async fn remove_filter(&self, state: &dyn StatePort, name: &str) -> QueueResult<()> {
        self.edit_standing(state, "RemoveFilter", |context| {
            context.remove_filter(name);
        })
        .await
    }

    /// Append a sort name to the standing selection
    #[instrument(skip_all, fields(operation = "AddSort", sort = %name))]
    pub async fn add_sort(&self, state: &dyn StatePort, name: &str) -> QueueResult<()> {
        self.edit_standing(state, "AddSort", |context| context.add_sort(name))
            .await
    }

    /// Remove every occurrence of a sort name from the standing selection
    #[instrument(skip_all, fields(operation = "RemoveSort", sort = %name))]
    pub async fn remove_sort(&self, state: &dyn StatePort, name: &str) -> QueueResult<()> {
        self.edit_standing(state, "RemoveSort", |context| {
            context.remove_sort(name);
        })
        .await
    }

    async fn edit_standing<F>(
        &self,
        state: &dyn StatePort,
        operation: &'static str,
        edit: F,
    ) -> QueueResult<()>
    where
        F: FnOnce(&mut QueueContext),
    {
        self.edit_standing_inner(state, operation, edit)
            .await
            .map_err(|e| e.within(operation))
    }

    async fn edit_standing_inner<F>(
        &self,
        state: &dyn StatePort,
        operation: &'static str,
        edit: F,
    ) -> QueueResult<()>
    where
        F: FnOnce(&mut QueueContext),
    {
        if self.mode != SelectionMode::Standing {
            return Err(QueueError::SelectionModeMismatch {
                operation,
                mode: self.mode,
            });
        }

        let mut context = self.load(state).await?;
        edit(&mut context);
        self.store(state, &context).await?;

        debug!(filters = ?context.filters, sorts = ?context.sorts, "Standing selection updated");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Standing mode takes its Peek selection from the aggregate, so
    /// call-time specs must be empty
    fn require_call_time_selection(
        &self,
        operation: &'static str,
        specs: &[&SelectionSpec],
    ) -> QueueResult<()> {
        if self.mode == SelectionMode::Standing && specs.iter().any(|spec| !spec.is_empty()) {
            return Err(QueueError::SelectionModeMismatch {
                operation,
                mode: self.mode,
            });
        }
        Ok(())
    }

    fn resolve(
        &self,
        context: &QueueContext,
        filters: &SelectionSpec,
        sorts: &SelectionSpec,
    ) -> QueueResult<(Vec<ActiveFilter>, Vec<ActiveSort>)> {
        let (filters, sorts) = match self.mode {
            SelectionMode::PerRequest => (
                self.extensions.filters(filters)?,
                self.extensions.sorts(sorts)?,
            ),
            SelectionMode::Standing => (
                self.extensions
                    .filters(&SelectionSpec::from_names(context.filters.iter().cloned()))?,
                self.extensions
                    .sorts(&SelectionSpec::from_names(context.sorts.iter().cloned()))?,
            ),
        };

        debug!(
            filters = ?filters.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            sorts = ?sorts.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "Resolved selection"
        );
        Ok((filters, sorts))
    }

    async fn load(&self, state: &dyn StatePort) -> QueueResult<QueueContext> {
        let raw = state
            .get(CONTEXT_KEY)
            .await?
            .ok_or(QueueError::NotInitialized)?;
        let context = QueueContext::from_bytes(&raw)?;

        if self.mode == SelectionMode::PerRequest && context.has_standing_selection() {
            return Err(QueueError::MixedAggregate {
                filters: context.filters,
                sorts: context.sorts,
            });
        }

        Ok(context)
    }

    async fn store(&self, state: &dyn StatePort, context: &QueueContext) -> QueueResult<()> {
        let raw = context.to_bytes()?;
        state.put(CONTEXT_KEY, raw).await?;
        Ok(())
    }
}

/// Items satisfying every filter, paired with their insertion position
fn eligible<'a>(items: &'a [Item], filters: &[ActiveFilter]) -> Vec<(usize, &'a Item)> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| filters.iter().all(|f| f.matches(item)))
        .collect()
}

/// The item that would come first after applying the sorts in turn.
///
/// Every sort is a full reorder with insertion position breaking ties, so the
/// order left by an earlier sort never survives a later one; only the last
/// sort can affect the head.
fn head<'a>(eligible: &[(usize, &'a Item)], sorts: &[ActiveSort]) -> Option<&'a Item> {
    let chosen = match sorts.last() {
        Some(sort) => eligible
            .iter()
            .min_by(|(pa, a), (pb, b)| sort.compare(a, b).then(pa.cmp(pb))),
        None => eligible.first(),
    };
    chosen.map(|(_, item)| *item)
}
