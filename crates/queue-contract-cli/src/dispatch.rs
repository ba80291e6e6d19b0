//! # Function Dispatch
//!
//! Decodes a `(function, args)` invocation, where every argument is a string,
//! into a queue engine call and encodes the result as a [`Response`].
//!
//! | Function       | Arguments                    | Payload on success     |
//! |----------------|------------------------------|------------------------|
//! | `Init`         | none                         | none                   |
//! | `Put`          | one or more item documents   | JSON array of item IDs |
//! | `Peek`         | `[sortSpec] [filterSpec]`    | JSON item or `null`    |
//! | `Update`       | `payload [filterSpec]`       | none                   |
//! | `AddFilter`    | `name`                       | none                   |
//! | `RemoveFilter` | `name`                       | none                   |
//! | `AddSort`      | `name`                       | none                   |
//! | `RemoveSort`   | `name`                       | none                   |

use queue_contract_core::{NewItem, Payload, QueueEngine, QueueError, SelectionSpec, StatePort};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

// ============================================================================
// Errors
// ============================================================================

/// Failures of a single invocation, each rendered with the function name
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid invoke function name")]
    UnknownFunction { function: String },

    #[error("{function}: missing arguments")]
    MissingArguments { function: &'static str },

    #[error("{function}: too many arguments")]
    TooManyArguments { function: &'static str },

    #[error("{function}: invalid argument {position}: {source}")]
    InvalidArgument {
        function: &'static str,
        position: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{function}: {}", .source.root())]
    Queue {
        function: &'static str,
        #[source]
        source: QueueError,
    },

    #[error("{function}: result could not be encoded: {source}")]
    Encoding {
        function: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl DispatchError {
    /// True when the caller sent something the dispatcher cannot decode
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownFunction { .. }
                | Self::MissingArguments { .. }
                | Self::TooManyArguments { .. }
                | Self::InvalidArgument { .. }
        )
    }

    /// The engine error behind this failure, if any
    pub fn queue_error(&self) -> Option<&QueueError> {
        match self {
            Self::Queue { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Ok,
    Error,
}

/// Outcome of an invocation, shaped like a contract response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn success(payload: Option<String>) -> Self {
        Self {
            status: Status::Ok,
            payload,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            payload: None,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl From<&Result<Option<String>, DispatchError>> for Response {
    fn from(result: &Result<Option<String>, DispatchError>) -> Self {
        match result {
            Ok(payload) => Self::success(payload.clone()),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes named invocations to a queue engine bound to one state store
#[derive(Clone)]
pub struct Dispatcher {
    engine: QueueEngine,
    state: Arc<dyn StatePort>,
}

impl Dispatcher {
    pub fn new(engine: QueueEngine, state: Arc<dyn StatePort>) -> Self {
        Self { engine, state }
    }

    pub fn engine(&self) -> &QueueEngine {
        &self.engine
    }

    /// Run an invocation and wrap the outcome in a [`Response`]
    pub async fn invoke(&self, function: &str, args: &[String]) -> Response {
        Response::from(&self.dispatch(function, args).await)
    }

    /// Run an invocation, returning the encoded payload on success
    #[instrument(skip(self, args), fields(arg_count = args.len()))]
    pub async fn dispatch(
        &self,
        function: &str,
        args: &[String],
    ) -> Result<Option<String>, DispatchError> {
        let state = self.state.as_ref();
        let result = match function {
            "Init" => {
                arity("Init", args, 0, Some(0))?;
                self.engine
                    .init(state)
                    .await
                    .map_err(|e| queue("Init", e))?;
                None
            }
            "Put" => {
                arity("Put", args, 1, None)?;
                let items = args
                    .iter()
                    .enumerate()
                    .map(|(i, raw)| decode::<NewItem>("Put", i, raw))
                    .collect::<Result<Vec<_>, _>>()?;
                let ids = self
                    .engine
                    .put(state, items)
                    .await
                    .map_err(|e| queue("Put", e))?;
                Some(encode("Put", &ids)?)
            }
            "Peek" => {
                arity("Peek", args, 0, Some(2))?;
                let sorts = spec("Peek", args, 0)?;
                let filters = spec("Peek", args, 1)?;
                let item = self
                    .engine
                    .peek(state, &sorts, &filters)
                    .await
                    .map_err(|e| queue("Peek", e))?;
                Some(encode("Peek", &item)?)
            }
            "Update" => {
                arity("Update", args, 1, Some(2))?;
                let data = decode::<Payload>("Update", 0, &args[0])?;
                let filters = spec("Update", args, 1)?;
                let matched = self
                    .engine
                    .update(state, data, &filters)
                    .await
                    .map_err(|e| queue("Update", e))?;
                debug!(matched, "Update dispatched");
                None
            }
            "AddFilter" => {
                arity("AddFilter", args, 1, Some(1))?;
                self.engine
                    .add_filter(state, &args[0])
                    .await
                    .map_err(|e| queue("AddFilter", e))?;
                None
            }
            "RemoveFilter" => {
                arity("RemoveFilter", args, 1, Some(1))?;
                self.engine
                    .remove_filter(state, &args[0])
                    .await
                    .map_err(|e| queue("RemoveFilter", e))?;
                None
            }
            "AddSort" => {
                arity("AddSort", args, 1, Some(1))?;
                self.engine
                    .add_sort(state, &args[0])
                    .await
                    .map_err(|e| queue("AddSort", e))?;
                None
            }
            "RemoveSort" => {
                arity("RemoveSort", args, 1, Some(1))?;
                self.engine
                    .remove_sort(state, &args[0])
                    .await
                    .map_err(|e| queue("RemoveSort", e))?;
                None
            }
            other => {
                warn!(function = %other, "Rejected unknown function");
                return Err(DispatchError::UnknownFunction {
                    function: other.to_string(),
                });
            }
        };

        Ok(result)
    }
}

// ============================================================================
// Argument Decoding
// ============================================================================

fn arity(
    function: &'static str,
    args: &[String],
    min: usize,
    max: Option<usize>,
) -> Result<(), DispatchError> {
    if args.len() < min {
        return Err(DispatchError::MissingArguments { function });
    }
    if max.map_or(false, |max| args.len() > max) {
        return Err(DispatchError::TooManyArguments { function });
    }
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(
    function: &'static str,
    position: usize,
    raw: &str,
) -> Result<T, DispatchError> {
    serde_json::from_str(raw).map_err(|source| DispatchError::InvalidArgument {
        function,
        position,
        source,
    })
}

/// Optional selection spec at `position`; absent, blank and `null` are empty
fn spec(
    function: &'static str,
    args: &[String],
    position: usize,
) -> Result<SelectionSpec, DispatchError> {
    match args.get(position) {
        Some(raw) => SelectionSpec::parse(raw).map_err(|source| DispatchError::InvalidArgument {
            function,
            position,
            source,
        }),
        None => Ok(SelectionSpec::new()),
    }
}

fn encode<T: Serialize>(function: &'static str, value: &T) -> Result<String, DispatchError> {
    serde_json::to_string(value).map_err(|source| DispatchError::Encoding { function, source })
}

fn queue(function: &'static str, source: QueueError) -> DispatchError {
    DispatchError::Queue { function, source }
}
