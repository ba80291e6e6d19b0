//! # Extension Registries
//!
//! Filters, sorts and validators are supplied by the deployment and looked up
//! by name. The engine only ever sees them through the capability traits in
//! this module and resolves them through an [`Extensions`] implementation
//! injected at construction.
//!
//! A request names the extensions it wants in a [`SelectionSpec`]:
//!
//! ```json
//! { "byIds": ["id-1", "id-2"], "even": [] }
//! ```
//!
//! Names resolve in the order they appear in the request. Names the registry
//! does not know resolve to nothing.

use crate::error::RegistryError;
use crate::item::{Item, Payload};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Capability Traits
// ============================================================================

/// Decides whether an item is eligible for selection or mutation
pub trait ItemFilter: Send + Sync {
    fn matches(&self, item: &Item, args: &[Value]) -> bool;
}

/// A "less-than" relation used to order eligible items
pub trait ItemSort: Send + Sync {
    fn less(&self, a: &Item, b: &Item, args: &[Value]) -> bool;
}

/// Checks a candidate payload before it is inserted
pub trait PayloadValidator: Send + Sync {
    /// Returns the reason for rejection, if any
    fn validate(&self, payload: &Payload) -> Result<(), String>;
}

impl<F> ItemFilter for F
where
    F: Fn(&Item, &[Value]) -> bool + Send + Sync,
{
    fn matches(&self, item: &Item, args: &[Value]) -> bool {
        self(item, args)
    }
}

impl<F> ItemSort for F
where
    F: Fn(&Item, &Item, &[Value]) -> bool + Send + Sync,
{
    fn less(&self, a: &Item, b: &Item, args: &[Value]) -> bool {
        self(a, b, args)
    }
}

impl<F> PayloadValidator for F
where
    F: Fn(&Payload) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, payload: &Payload) -> Result<(), String> {
        self(payload)
    }
}

// ============================================================================
// Selection Spec
// ============================================================================

/// One requested extension together with its extra arguments
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEntry {
    pub name: String,
    pub args: Vec<Value>,
}

/// Ordered mapping from extension name to arguments.
///
/// Serialized as a JSON object; entry order follows the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSpec {
    entries: Vec<SelectionEntry>,
}

impl SelectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named entry with arguments
    pub fn with(mut self, name: impl Into<String>, args: Vec<Value>) -> Self {
        self.entries.push(SelectionEntry {
            name: name.into(),
            args,
        });
        self
    }

    /// Build a spec from bare names, each with no arguments
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: names
                .into_iter()
                .map(|name| SelectionEntry {
                    name: name.into(),
                    args: Vec::new(),
                })
                .collect(),
        }
    }

    /// Parse a spec from JSON; blank input and `null` mean "no entries"
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str::<Option<Self>>(raw).map(Option::unwrap_or_default)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}

impl Serialize for SelectionSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.args)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SelectionSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = SelectionSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping extension names to argument arrays")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, args)) = access.next_entry::<String, Option<Vec<Value>>>()? {
                    entries.push(SelectionEntry {
                        name,
                        args: args.unwrap_or_default(),
                    });
                }
                Ok(SelectionSpec { entries })
            }
        }

        deserializer.deserialize_map(SpecVisitor)
    }
}

// ============================================================================
// Resolved Behaviors
// ============================================================================

/// A filter resolved from a request, bound to its arguments
#[derive(Clone)]
pub struct ActiveFilter {
    pub name: String,
    pub filter: Arc<dyn ItemFilter>,
    pub args: Vec<Value>,
}

impl ActiveFilter {
    pub fn matches(&self, item: &Item) -> bool {
        self.filter.matches(item, &self.args)
    }
}

impl fmt::Debug for ActiveFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveFilter")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// A sort resolved from a request, bound to its arguments
#[derive(Clone)]
pub struct ActiveSort {
    pub name: String,
    pub sort: Arc<dyn ItemSort>,
    pub args: Vec<Value>,
}

impl ActiveSort {
    /// Turn the less-than relation into an ordering; items neither less nor
    /// greater than each other compare equal
    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        if self.sort.less(a, b, &self.args) {
            Ordering::Less
        } else if self.sort.less(b, a, &self.args) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

impl fmt::Debug for ActiveSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSort")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// A named validator
#[derive(Clone)]
pub struct ActiveValidator {
    pub name: String,
    pub validator: Arc<dyn PayloadValidator>,
}

impl fmt::Debug for ActiveValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveValidator")
            .field("name", &self.name)
            .finish()
    }
}

// ============================================================================
// Extensions
// ============================================================================

/// Deployment-supplied resolution of names to behaviors.
///
/// Implementations return behaviors in the order requested and silently drop
/// names they do not know. An `Err` is reserved for the registry itself
/// failing, never for an unknown name.
pub trait Extensions: Send + Sync {
    fn filters(&self, spec: &SelectionSpec) -> Result<Vec<ActiveFilter>, RegistryError>;

    fn sorts(&self, spec: &SelectionSpec) -> Result<Vec<ActiveSort>, RegistryError>;

    /// Every validator that applies to `Put`
    fn validators(&self) -> Result<Vec<ActiveValidator>, RegistryError>;
}

/// Registry mapping names to filters, sorts and validators.
///
/// Built once by the deployment and shared read-only afterwards.
///
/// # Examples
///
/// ```rust
/// use queue_contract_core::extensions::{ExtensionRegistry, Extensions, SelectionSpec};
/// use queue_contract_core::Item;
///
/// let mut registry = ExtensionRegistry::new();
/// registry.register_filter("even", |item: &Item, _: &[serde_json::Value]| {
///     item.number("value").map_or(false, |v| v as i64 % 2 == 0)
/// });
///
/// let spec = SelectionSpec::from_names(["even", "unknown"]);
/// assert_eq!(registry.filters(&spec).unwrap().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    filters: HashMap<String, Arc<dyn ItemFilter>>,
    sorts: HashMap<String, Arc<dyn ItemSort>>,
    validators: Vec<ActiveValidator>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter, replacing any filter with the same name
    pub fn register_filter(
        &mut self,
        name: impl Into<String>,
        filter: impl ItemFilter + 'static,
    ) -> &mut Self {
        self.filters.insert(name.into(), Arc::new(filter));
        self
    }

    /// Register a sort, replacing any sort with the same name
    pub fn register_sort(
        &mut self,
        name: impl Into<String>,
        sort: impl ItemSort + 'static,
    ) -> &mut Self {
        self.sorts.insert(name.into(), Arc::new(sort));
        self
    }

    /// Register a validator, replacing any validator with the same name.
    ///
    /// Validators run in registration order.
    pub fn register_validator(
        &mut self,
        name: impl Into<String>,
        validator: impl PayloadValidator + 'static,
    ) -> &mut Self {
        let name = name.into();
        let validator: Arc<dyn PayloadValidator> = Arc::new(validator);
        match self.validators.iter_mut().find(|v| v.name == name) {
            Some(existing) => existing.validator = validator,
            None => self.validators.push(ActiveValidator { name, validator }),
        }
        self
    }

    pub fn contains_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn contains_sort(&self, name: &str) -> bool {
        self.sorts.contains_key(name)
    }

    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn sort_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sorts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn validator_names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name.as_str()).collect()
    }
}

impl Extensions for ExtensionRegistry {
    fn filters(&self, spec: &SelectionSpec) -> Result<Vec<ActiveFilter>, RegistryError> {
        Ok(spec
            .entries()
            .iter()
            .filter_map(|entry| match self.filters.get(&entry.name) {
                Some(filter) => Some(ActiveFilter {
                    name: entry.name.clone(),
                    filter: Arc::clone(filter),
                    args: entry.args.clone(),
                }),
                None => {
                    debug!(filter = %entry.name, "Ignoring unknown filter");
                    None
                }
            })
            .collect())
    }

    fn sorts(&self, spec: &SelectionSpec) -> Result<Vec<ActiveSort>, RegistryError> {
        Ok(spec
            .entries()
            .iter()
            .filter_map(|entry| match self.sorts.get(&entry.name) {
                Some(sort) => Some(ActiveSort {
                    name: entry.name.clone(),
                    sort: Arc::clone(sort),
                    args: entry.args.clone(),
                }),
                None => {
                    debug!(sort = %entry.name, "Ignoring unknown sort");
                    None
                }
            })
            .collect())
    }

    fn validators(&self) -> Result<Vec<ActiveValidator>, RegistryError> {
        Ok(self.validators.clone())
    }
}

#[cfg(test)]
#[path = "extensions_tests.rs"]
mod tests;
