//! Error types for queue operations.

use crate::context::SelectionMode;
use crate::state::StateError;
use std::fmt;
use thiserror::Error;

/// Comprehensive error type for all queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue has not been initialized")]
    NotInitialized,

    #[error("stored queue context could not be decoded: {0}")]
    Corrupted(#[source] serde_json::Error),

    #[error("queue context could not be encoded: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("{0}")]
    ValidationFailed(ValidationReport),

    #[error("malformed request: {message}")]
    MalformedRequest { message: String },

    #[error("{operation} is not available in {mode} selection mode")]
    SelectionModeMismatch {
        operation: &'static str,
        mode: SelectionMode,
    },

    #[error(
        "stored queue context carries standing selection (filters: {filters:?}, sorts: {sorts:?}) \
         but the engine runs in per_request mode"
    )]
    MixedAggregate {
        filters: Vec<String>,
        sorts: Vec<String>,
    },

    #[error("state store failure: {0}")]
    State(#[from] StateError),

    #[error("extension registry failure: {0}")]
    Registry(#[from] RegistryError),

    #[error("QueueContract.{operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<QueueError>,
    },
}

impl QueueError {
    /// Wrap the error with the name of the operation it escaped from
    pub fn within(self, operation: &'static str) -> Self {
        match self {
            Self::Operation { .. } => self,
            other => Self::Operation {
                operation,
                source: Box::new(other),
            },
        }
    }

    /// Strip operation context and return the underlying error
    pub fn root(&self) -> &QueueError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the operation that produced the error, if recorded
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Operation { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Check if the caller may retry the operation from a fresh read.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            Self::State(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Check if the error is a rejected `Put` batch
    pub fn is_validation_failure(&self) -> bool {
        matches!(self.root(), Self::ValidationFailed(_))
    }
}

/// Failure reported by a deployment-supplied extension registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("extension '{name}' rejected its arguments: {message}")]
    InvalidArguments { name: String, message: String },

    #[error("extensions unavailable: {message}")]
    Unavailable { message: String },
}

// ============================================================================
// Validation Report
// ============================================================================

/// A single (validator, item) pair that failed during `Put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub validator: String,
    /// Position of the item within the submitted batch
    pub item_index: usize,
    pub reason: String,
}

/// Every validation failure collected for a rejected batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: ValidationFailure) {
        self.failures.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Convert into an error when at least one failure was recorded
    pub fn into_result(self) -> Result<(), QueueError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(QueueError::ValidationFailed(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for failure in &self.failures {
            writeln!(
                f,
                "\tFailed validation: {} (item {}): {}",
                failure.validator, failure.item_index, failure.reason
            )?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
