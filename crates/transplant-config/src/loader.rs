//! Reading configuration files from disk.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppConfig, RawConfig};
use crate::validate::validate;

/// File looked up when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Template shipped with the tool.
pub const EXAMPLE_CONFIG_PATH: &str = "config.example.toml";

/// Load and validate the configuration at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] with a hint to copy the example file when
/// `path` does not exist, and the parse or validation error otherwise.
pub fn load_config(path: &Path) -> ConfigResult<AppConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                operation: "read",
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    debug!(path = %path.display(), "configuration file read");
    parse_config(&contents)
}

/// Parse and validate configuration text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and the first validation
/// failure otherwise.
pub fn parse_config(contents: &str) -> ConfigResult<AppConfig> {
    let raw: RawConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse { source })?;
    validate(raw)
}
