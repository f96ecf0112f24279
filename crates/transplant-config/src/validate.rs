//! Section checks turning a [`RawConfig`] into an [`AppConfig`].

use std::time::Duration;

use transplant_torrent_core::{Credentials, TransferStrategy};
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AppConfig, DEFAULT_DAEMON_PORT, DaemonEndpoint, DelugeConfig, LoggingSettings,
    MigrationConfig, QbittorrentConfig, RawConfig, RawDeluge, RawLogging, RawMigration,
    RawQbittorrent,
};

/// Validate every section and convert it to its typed form.
///
/// # Errors
///
/// Returns [`ConfigError::MissingSection`] for an absent required section and
/// [`ConfigError::InvalidField`] for the first value that fails its check.
pub fn validate(raw: RawConfig) -> ConfigResult<AppConfig> {
    let deluge = raw
        .deluge
        .ok_or(ConfigError::MissingSection { section: "deluge" })?;
    let qbittorrent = raw.qbittorrent.ok_or(ConfigError::MissingSection {
        section: "qbittorrent",
    })?;
    let migration = raw.migration.ok_or(ConfigError::MissingSection {
        section: "migration",
    })?;

    let deluge = validate_deluge(deluge)?;
    let migration = validate_migration(migration)?;
    check_transfer(&deluge, migration.transfer)?;
    Ok(AppConfig {
        deluge,
        qbittorrent: validate_qbittorrent(qbittorrent)?,
        migration,
        logging: validate_logging(raw.logging)?,
    })
}

/// Ensure the chosen transfer strategy has what it needs.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when metainfo transfer lacks a state directory.
pub fn check_transfer(deluge: &DelugeConfig, transfer: TransferStrategy) -> ConfigResult<()> {
    if transfer == TransferStrategy::Metainfo && deluge.state_dir.is_none() {
        return Err(ConfigError::invalid(
            "deluge",
            "state_dir",
            None,
            "required when migration.transfer is \"metainfo\"",
        ));
    }
    Ok(())
}

fn validate_deluge(raw: RawDeluge) -> ConfigResult<DelugeConfig> {
    let url = parse_http_url("deluge", &raw.url)?;
    let daemon = match (raw.daemon_host, raw.daemon_port) {
        (Some(host), port) => {
            let host = host.trim().to_string();
            if host.is_empty() {
                return Err(ConfigError::invalid(
                    "deluge",
                    "daemon_host",
                    None,
                    "must not be empty",
                ));
            }
            Some(DaemonEndpoint {
                host,
                port: port.unwrap_or(DEFAULT_DAEMON_PORT),
            })
        }
        (None, Some(port)) => {
            return Err(ConfigError::invalid(
                "deluge",
                "daemon_port",
                Some(&port.to_string()),
                "requires daemon_host",
            ));
        }
        (None, None) => None,
    };
    if daemon.as_ref().is_some_and(|daemon| daemon.port == 0) {
        return Err(ConfigError::invalid(
            "deluge",
            "daemon_port",
            Some("0"),
            "must be between 1 and 65535",
        ));
    }
    Ok(DelugeConfig {
        url,
        password: raw.password,
        daemon,
        state_dir: raw.state_dir,
    })
}

fn validate_qbittorrent(raw: RawQbittorrent) -> ConfigResult<QbittorrentConfig> {
    let url = parse_http_url("qbittorrent", &raw.url)?;
    if raw.username.trim().is_empty() {
        return Err(ConfigError::invalid(
            "qbittorrent",
            "username",
            None,
            "must not be empty",
        ));
    }
    Ok(QbittorrentConfig {
        url,
        credentials: Credentials::new(raw.username, raw.password),
    })
}

fn validate_migration(raw: RawMigration) -> ConfigResult<MigrationConfig> {
    let test_torrent = if raw.test_mode {
        let name = raw.test_torrent_name.trim();
        if name.is_empty() {
            return Err(ConfigError::invalid(
                "migration",
                "test_torrent_name",
                None,
                "must be set when test_mode is enabled",
            ));
        }
        Some(raw.test_torrent_name)
    } else {
        None
    };
    Ok(MigrationConfig {
        test_torrent,
        auto_delete: raw.auto_delete,
        auto_resume: raw.auto_resume,
        transfer: raw.transfer,
        poll_interval: positive_secs("poll_interval_secs", raw.poll_interval_secs)?,
        metadata_timeout: positive_secs("metadata_timeout_secs", raw.metadata_timeout_secs)?,
        recheck_timeout: positive_secs("recheck_timeout_secs", raw.recheck_timeout_secs)?,
        request_timeout: positive_secs("request_timeout_secs", raw.request_timeout_secs)?,
    })
}

fn validate_logging(raw: RawLogging) -> ConfigResult<LoggingSettings> {
    let level = raw.log_level.trim().to_ascii_lowercase();
    if level.is_empty() {
        return Err(ConfigError::invalid(
            "logging",
            "log_level",
            None,
            "must not be empty",
        ));
    }
    Ok(LoggingSettings {
        level,
        format: raw.log_format,
    })
}

fn parse_http_url(section: &'static str, value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value.trim())
        .map_err(|_| ConfigError::invalid(section, "url", Some(value), "must be an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            section,
            "url",
            Some(value),
            "scheme must be http or https",
        ));
    }
    Ok(url)
}

fn positive_secs(field: &'static str, value: u64) -> ConfigResult<Duration> {
    if value == 0 {
        return Err(ConfigError::invalid(
            "migration",
            field,
            Some("0"),
            "must be greater than zero",
        ));
    }
    Ok(Duration::from_secs(value))
}
