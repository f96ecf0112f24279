//! Raw file sections and the validated configuration built from them.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use transplant_telemetry::{DEFAULT_LOG_LEVEL, LogFormat};
use transplant_torrent_core::{Credentials, TransferStrategy};
use url::Url;

use crate::error::ConfigResult;
use crate::validate::check_transfer;

/// Port the Deluge daemon listens on unless configured otherwise.
pub const DEFAULT_DAEMON_PORT: u16 = 58846;

/// File contents as deserialized, before any checks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    /// `[deluge]` section.
    pub deluge: Option<RawDeluge>,
    /// `[qbittorrent]` section.
    pub qbittorrent: Option<RawQbittorrent>,
    /// `[migration]` section.
    pub migration: Option<RawMigration>,
    /// `[logging]` section.
    #[serde(default)]
    pub logging: RawLogging,
}

/// `[deluge]` as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDeluge {
    /// Web UI base URL.
    pub url: String,
    /// Web UI password.
    pub password: String,
    /// Daemon host the Web UI should attach to.
    #[serde(default)]
    pub daemon_host: Option<String>,
    /// Daemon port the Web UI should attach to.
    #[serde(default)]
    pub daemon_port: Option<u16>,
    /// Directory holding `<hash>.torrent` state files.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

/// `[qbittorrent]` as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQbittorrent {
    /// Web UI base URL.
    pub url: String,
    /// Web UI user.
    pub username: String,
    /// Web UI password.
    pub password: String,
}

/// `[migration]` as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawMigration {
    /// Restrict the run to a single named torrent.
    pub test_mode: bool,
    /// Name looked up in test mode.
    pub test_torrent_name: String,
    /// Remove verified torrents from the source.
    pub auto_delete: bool,
    /// Resume verified torrents at the destination.
    pub auto_resume: bool,
    /// How torrents are handed over.
    pub transfer: TransferStrategy,
    /// Seconds between status probes.
    pub poll_interval_secs: u64,
    /// Upper bound on waiting for magnet metadata.
    pub metadata_timeout_secs: u64,
    /// Upper bound on waiting for a recheck.
    pub recheck_timeout_secs: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for RawMigration {
    fn default() -> Self {
        Self {
            test_mode: false,
            test_torrent_name: String::new(),
            auto_delete: false,
            auto_resume: false,
            transfer: TransferStrategy::default(),
            poll_interval_secs: 2,
            metadata_timeout_secs: 300,
            recheck_timeout_secs: 1800,
            request_timeout_secs: 30,
        }
    }
}

/// `[logging]` as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawLogging {
    /// Level or filter directive.
    pub log_level: String,
    /// Output format.
    pub log_format: LogFormat,
}

impl Default for RawLogging {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Source daemon.
    pub deluge: DelugeConfig,
    /// Destination daemon.
    pub qbittorrent: QbittorrentConfig,
    /// Run behaviour.
    pub migration: MigrationConfig,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Daemon the Deluge Web UI should be attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonEndpoint {
    /// Host as registered in the Web UI.
    pub host: String,
    /// RPC port.
    pub port: u16,
}

/// Validated `[deluge]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelugeConfig {
    /// Web UI base URL.
    pub url: Url,
    /// Web UI password.
    pub password: String,
    /// Daemon to attach when the Web UI is detached.
    pub daemon: Option<DaemonEndpoint>,
    /// Directory holding `<hash>.torrent` state files.
    pub state_dir: Option<PathBuf>,
}

/// Validated `[qbittorrent]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QbittorrentConfig {
    /// Web UI base URL.
    pub url: Url,
    /// Login for the Web UI.
    pub credentials: Credentials,
}

/// Validated `[migration]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Name of the only torrent to migrate, when test mode is on.
    pub test_torrent: Option<String>,
    /// Remove verified torrents from the source.
    pub auto_delete: bool,
    /// Resume verified torrents at the destination.
    pub auto_resume: bool,
    /// How torrents are handed over.
    pub transfer: TransferStrategy,
    /// Interval between status probes.
    pub poll_interval: Duration,
    /// Upper bound on waiting for magnet metadata.
    pub metadata_timeout: Duration,
    /// Upper bound on waiting for a recheck.
    pub recheck_timeout: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

/// Validated `[logging]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Level or filter directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Enable test mode for this torrent name.
    pub test_torrent: Option<String>,
    /// Force source removal on.
    pub auto_delete: bool,
    /// Force resuming on.
    pub auto_resume: bool,
    /// Replace the transfer strategy.
    pub transfer: Option<TransferStrategy>,
    /// Replace the log level.
    pub log_level: Option<String>,
    /// Replace the log format.
    pub log_format: Option<LogFormat>,
}

impl AppConfig {
    /// Layer command-line overrides on top of the file values.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] when the overridden transfer
    /// strategy needs settings the file does not provide.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> ConfigResult<Self> {
        if let Some(name) = overrides.test_torrent.filter(|name| !name.trim().is_empty()) {
            self.migration.test_torrent = Some(name);
        }
        self.migration.auto_delete |= overrides.auto_delete;
        self.migration.auto_resume |= overrides.auto_resume;
        if let Some(transfer) = overrides.transfer {
            self.migration.transfer = transfer;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        check_transfer(&self.deluge, self.migration.transfer)?;
        Ok(self)
    }
}
