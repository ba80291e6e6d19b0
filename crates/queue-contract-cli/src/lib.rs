//! # Queue Contract CLI
//!
//! Command-line host for the queue contract engine.
//!
//! The CLI is a deployment of the engine: it supplies the bundled extension
//! registry, keeps the queue aggregate in a [`FilesystemStateStore`] and
//! routes every command through the function [`Dispatcher`], so
//!
//! ```text
//! queue-contract peek --sort '{"desc": []}'
//! queue-contract invoke Peek '{"desc": []}'
//! ```
//!
//! do the same thing. Results go to stdout as JSON; logs go to stderr.

pub mod config;
pub mod dispatch;
pub mod extensions;

use clap::{Parser, Subcommand};
use crate::config::{load_configuration, CliConfig, ConfigError};
use crate::dispatch::{DispatchError, Dispatcher, Response};
use queue_contract_core::adapters::FilesystemStateStore;
use queue_contract_core::{QueueEngine, StateError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue Contract CLI - persisted queue with pluggable filters and sorts
#[derive(Parser)]
#[command(name = "queue-contract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Persisted priority queue with pluggable filters and sorts")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QUEUE_CONTRACT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, overriding the configured level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Directory holding the queue state, overriding the configured one
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty queue, discarding any existing items
    Init,

    /// Add items; each ITEM is a JSON document like '{"data": {...}}'
    Put {
        #[arg(required = true, num_args = 1..)]
        items: Vec<String>,
    },

    /// Remove and print the best matching item
    Peek {
        /// Sort spec, e.g. '{"desc": []}'
        #[arg(short, long)]
        sort: Option<String>,

        /// Filter spec, e.g. '{"byIds": ["..."]}'
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Replace the payload of every matching item
    Update {
        /// New payload as a JSON object
        payload: String,

        /// Filter spec selecting the items to replace
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Turn on a standing filter
    AddFilter { name: String },

    /// Turn off a standing filter
    RemoveFilter { name: String },

    /// Turn on a standing sort
    AddSort { name: String },

    /// Turn off a standing sort
    RemoveSort { name: String },

    /// Call a function by name and print the full response
    Invoke {
        function: String,

        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the resolved configuration
    Config,

    /// List the bundled filters, sorts and validators
    Extensions,
}

impl Commands {
    /// The dispatcher call this command maps to, if any
    pub fn invocation(&self) -> Option<(String, Vec<String>)> {
        let call = |function: &str, args: Vec<String>| Some((function.to_string(), args));
        match self {
            Self::Init => call("Init", Vec::new()),
            Self::Put { items } => call("Put", items.clone()),
            Self::Peek { sort, filter } => {
                let mut args = Vec::new();
                match (sort, filter) {
                    (None, None) => {}
                    (Some(sort), None) => args.push(sort.clone()),
                    (sort, Some(filter)) => {
                        args.push(sort.clone().unwrap_or_default());
                        args.push(filter.clone());
                    }
                }
                call("Peek", args)
            }
            Self::Update { payload, filter } => {
                let mut args = vec![payload.clone()];
                args.extend(filter.clone());
                call("Update", args)
            }
            Self::AddFilter { name } => call("AddFilter", vec![name.clone()]),
            Self::RemoveFilter { name } => call("RemoveFilter", vec![name.clone()]),
            Self::AddSort { name } => call("AddSort", vec![name.clone()]),
            Self::RemoveSort { name } => call("RemoveSort", vec![name.clone()]),
            Self::Invoke { function, args } => call(function.as_str(), args.clone()),
            Self::Config | Self::Extensions => None,
        }
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("State store error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error("Output could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Logging { .. } => 1,
            Self::State(_) => 2,
            Self::Dispatch(e) if e.is_usage_error() => 4,
            Self::Dispatch(e) => match e.queue_error() {
                Some(q) if q.is_validation_failure() => 3,
                Some(q) if q.is_retryable() => 5,
                _ => 6,
            },
            Self::Json(_) => 6,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    run(Cli::parse()).await
}

/// Execute an already parsed command line
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_configuration(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    if let Some(dir) = &cli.state_dir {
        config.state.directory = dir.clone();
    }

    initialize_logging(&config)?;
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "Loaded configuration from explicit path");
    }
    debug!(config = ?config, "Configuration resolved");

    let Some((function, args)) = cli.command.invocation() else {
        return execute_local_command(&cli.command, &config);
    };

    let dispatcher = build_dispatcher(&config).await?;
    let result = dispatcher.dispatch(&function, &args).await;

    if matches!(cli.command, Commands::Invoke { .. }) {
        println!("{}", serde_json::to_string(&Response::from(&result))?);
    } else if let Ok(Some(payload)) = &result {
        println!("{}", payload);
    }

    result?;
    info!(function = %function, "Command completed");
    Ok(())
}

/// Wire the engine to the configured state directory and extensions
pub async fn build_dispatcher(config: &CliConfig) -> Result<Dispatcher, CliError> {
    let store = FilesystemStateStore::new(config.state.directory.clone()).await?;
    let registry = extensions::bundled_registry(&config.validation);
    let engine = QueueEngine::new(Arc::new(registry)).with_mode(config.selection.mode);

    debug!(
        directory = %config.state.directory.display(),
        mode = %config.selection.mode,
        "Queue engine ready"
    );
    Ok(Dispatcher::new(engine, Arc::new(store)))
}

/// Install the global tracing subscriber, writing to stderr
fn initialize_logging(config: &CliConfig) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })?;

    let (plain, json) = if config.logging.json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .try_init()
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })
}

/// Commands answered without touching the queue
fn execute_local_command(command: &Commands, config: &CliConfig) -> Result<(), CliError> {
    match command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Extensions => {
            let registry = extensions::bundled_registry(&config.validation);
            let listing = serde_json::json!({
                "filters": registry.filter_names(),
                "sorts": registry.sort_names(),
                "validators": registry.validator_names(),
            });
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
