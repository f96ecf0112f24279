//! Error types for configuration loading and validation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error(
        "configuration file '{}' not found; copy 'config.example.toml' to '{}' and fill in your credentials",
        .path.display(),
        .path.display()
    )]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },
    /// File system operation failed.
    #[error("failed to {operation} '{}'", .path.display())]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File involved.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The file is not valid TOML or does not match the expected shape.
    #[error("invalid TOML in configuration file")]
    Parse {
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A required section is absent.
    #[error("missing required section '{section}'")]
    MissingSection {
        /// Section name.
        section: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid value for '{field}' in '{section}': {reason}")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Human-readable reason for the failure.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &'static str,
        field: &'static str,
        value: Option<&str>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section,
            field,
            value: value.map(str::to_string),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
