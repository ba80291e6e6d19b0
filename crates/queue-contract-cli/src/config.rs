//! # CLI Configuration
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. `/etc/queue-contract/cli.toml` (optional)
//! 2. `./config/cli.toml` (optional)
//! 3. The file passed with `--config` (must exist)
//! 4. Environment variables prefixed `QC__`, e.g. `QC__STATE__DIRECTORY`
//!
//! Every field has a default, so an unconfigured environment still yields a
//! usable configuration.

use queue_contract_core::SelectionMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "QC";

const SYSTEM_CONFIG: &str = "/etc/queue-contract/cli";
const LOCAL_CONFIG: &str = "config/cli";

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),

    #[error("Configuration could not be rendered: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Resolved CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub state: StateConfig,
    pub selection: SelectionConfig,
    pub logging: LoggingConfig,
    pub validation: ValidationConfig,
}

impl CliConfig {
    /// Reject values that deserialize but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state.directory.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "state.directory".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let fields = self
            .validation
            .required_fields
            .iter()
            .chain(&self.validation.numeric_fields);
        for field in fields {
            if field.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "validation".to_string(),
                    message: "field names must not be blank".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

/// Where the queue aggregate is kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub directory: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./.queue-contract"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub mode: SelectionMode,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Payload fields checked on every Put
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub required_fields: Vec<String>,
    pub numeric_fields: Vec<String>,
}

// ============================================================================
// Loading
// ============================================================================

/// Load configuration from the standard locations plus an optional explicit
/// file
pub fn load_configuration(explicit: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name(SYSTEM_CONFIG)
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::File::with_name(LOCAL_CONFIG)
                .required(false)
                .format(config::FileFormat::Toml),
        );

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        builder = builder.add_source(
            config::File::from(path)
                .required(true)
                .format(config::FileFormat::Toml),
        );
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("validation.required_fields")
                .with_list_parse_key("validation.numeric_fields"),
        )
        .build()?;

    let config: CliConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
