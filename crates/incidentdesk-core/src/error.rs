//! Core error types for incidentdesk-core.
//!
//! Timer tasks never surface errors; everything here is raised either while
//! building configuration and entities, or while loading/saving config files.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for incidentdesk-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors raised when constructing timed entities.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Inverted or empty range
    #[error("Invalid range for '{field}': min ({min}) must not exceed max ({max})")]
    InvalidRange { field: String, min: u64, max: u64 },
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => {
                ConfigError::InvalidValue { key: field, message }
            }
            ValidationError::InvalidRange { field, min, max } => ConfigError::InvalidValue {
                key: field,
                message: format!("min ({min}) must not exceed max ({max})"),
            },
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_reports_its_field_as_config_key() {
        let err = ConfigError::from(ValidationError::InvalidRange {
            field: "spawner.between_secs".into(),
            min: 9,
            max: 3,
        });
        assert!(matches!(
            &err,
            ConfigError::InvalidValue { key, .. } if key == "spawner.between_secs"
        ));

        let core = CoreError::from(err);
        assert!(core.to_string().contains("min (9) must not exceed max (3)"));
    }
}
