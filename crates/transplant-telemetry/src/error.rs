//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing the logging pipeline.
#[derive(Debug)]
pub enum TelemetryError {
    /// The configured level was not a valid filter directive.
    InvalidFilter {
        /// Directive as configured.
        directive: String,
        /// Underlying parse error.
        source: tracing_subscriber::filter::ParseError,
    },
    /// The configured format name is unknown.
    UnknownFormat {
        /// Format as configured.
        value: String,
    },
    /// Installing the tracing subscriber failed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFilter { directive, .. } => {
                write!(formatter, "invalid log level '{directive}'")
            }
            Self::UnknownFormat { value } => {
                write!(formatter, "unknown log format '{value}' (expected pretty or json)")
            }
            Self::SubscriberInstall { .. } => {
                formatter.write_str("failed to install tracing subscriber")
            }
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFilter { source, .. } => Some(source),
            Self::UnknownFormat { .. } => None,
            Self::SubscriberInstall { source } => Some(source),
        }
    }
}
