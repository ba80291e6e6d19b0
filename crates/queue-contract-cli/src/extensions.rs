//! # Bundled Extensions
//!
//! Filters, sorts and validators registered by the command-line host.
//!
//! Filters:
//! - `byIds` (args: item IDs)
//! - `even` / `odd` on the numeric `value` field
//! - `fieldEquals` (args: field name, expected value)
//!
//! Sorts:
//! - `desc` / `asc` on the numeric `value` field
//! - `byField` (arg: field name), ascending
//!
//! Validators come from [`ValidationConfig`]: `required:<field>` and
//! `numeric:<field>` for each configured field.

use crate::config::ValidationConfig;
use queue_contract_core::{ExtensionRegistry, Item, Payload};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

#[cfg(test)]
#[path = "extensions_tests.rs"]
mod tests;

/// Field read by the numeric filters and sorts
pub const VALUE_FIELD: &str = "value";

/// Build the registry used by the command-line host
pub fn bundled_registry(validation: &ValidationConfig) -> ExtensionRegistry {
    let mut registry = ExtensionRegistry::new();

    registry
        .register_filter("byIds", by_ids)
        .register_filter("even", |item: &Item, _: &[Value]| {
            integer_value(item).map_or(false, |v| v % 2 == 0)
        })
        .register_filter("odd", |item: &Item, _: &[Value]| {
            integer_value(item).map_or(false, |v| v % 2 != 0)
        })
        .register_filter("fieldEquals", field_equals);

    registry
        .register_sort("desc", |a: &Item, b: &Item, _: &[Value]| {
            match (a.number(VALUE_FIELD), b.number(VALUE_FIELD)) {
                (Some(a), Some(b)) => a > b,
                (Some(_), None) => true,
                _ => false,
            }
        })
        .register_sort("asc", |a: &Item, b: &Item, _: &[Value]| {
            match (a.number(VALUE_FIELD), b.number(VALUE_FIELD)) {
                (Some(a), Some(b)) => a < b,
                (Some(_), None) => true,
                _ => false,
            }
        })
        .register_sort("byField", by_field);

    for field in &validation.required_fields {
        let name = field.clone();
        registry.register_validator(format!("required:{}", field), move |data: &Payload| {
            if data.contains_key(&name) {
                Ok(())
            } else {
                Err(format!("\"{}\" field is missing", name))
            }
        });
    }

    for field in &validation.numeric_fields {
        let name = field.clone();
        registry.register_validator(format!("numeric:{}", field), move |data: &Payload| {
            match data.get(&name) {
                Some(value) if value.is_number() => Ok(()),
                Some(_) => Err(format!("\"{}\" must be a number", name)),
                None => Err(format!("\"{}\" field is missing", name)),
            }
        });
    }

    debug!(
        filters = ?registry.filter_names(),
        sorts = ?registry.sort_names(),
        validators = ?registry.validator_names(),
        "Extension registry built"
    );
    registry
}

fn integer_value(item: &Item) -> Option<i64> {
    item.number(VALUE_FIELD)
        .filter(|v| v.fract() == 0.0)
        .map(|v| v as i64)
}

fn by_ids(item: &Item, args: &[Value]) -> bool {
    args.iter().any(|arg| arg.as_str() == Some(item.id.as_str()))
}

fn field_equals(item: &Item, args: &[Value]) -> bool {
    match (args.first().and_then(Value::as_str), args.get(1)) {
        (Some(field), Some(expected)) => item.field(field) == Some(expected),
        _ => false,
    }
}

fn by_field(a: &Item, b: &Item, args: &[Value]) -> bool {
    let Some(field) = args.first().and_then(Value::as_str) else {
        return false;
    };
    compare_values(a.field(field), b.field(field)) == Ordering::Less
}

/// Numbers compare numerically, strings lexically; present values sort
/// before absent ones and mismatched kinds compare equal
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
