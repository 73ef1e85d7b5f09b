//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range or inconsistent
    #[error("[{section}] invalid {field}: {message}")]
    Validation {
        /// Config section (e.g., "sync", "accounts")
        section: &'static str,
        /// Field name
        field: String,
        /// Error message
        message: String,
    },
}

impl ConfigError {
    /// Create a Validation error
    pub fn invalid(
        section: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            section,
            field: field.into(),
            message: message.into(),
        }
    }
}
