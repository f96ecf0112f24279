//! Daemon connections, error types, and settings wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use tracing::info;
use transplant_config::{DelugeConfig, MigrationConfig, QbittorrentConfig};
use transplant_deluge::{DaemonAddress, DelugeClient, DelugeOptions};
use transplant_migrate::{MigrationSettings, PollPolicy, SelectionMode, SessionFreshnessGuard};
use transplant_qbittorrent::{QbittorrentClient, QbittorrentOptions};
use transplant_torrent_core::TorrentError;
use url::Url;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Attach an operator-facing explanation to a failed connection attempt.
pub(crate) fn connection_error(daemon: &str, url: &Url, err: TorrentError) -> CliError {
    let context = match &err {
        TorrentError::AuthRejected { .. } => {
            format!("failed to log in to {daemon}: invalid credentials")
        }
        TorrentError::Connectivity { .. } => format!(
            "cannot connect to {daemon} at {url}; ensure its Web UI is running and accessible"
        ),
        _ => format!("failed to connect to {daemon} at {url}"),
    };
    CliError::failure(anyhow::Error::new(err).context(context))
}

/// Log in to the Deluge Web UI and attach it to a daemon.
pub(crate) async fn connect_source(
    config: &DelugeConfig,
    request_timeout: Duration,
) -> CliResult<DelugeClient> {
    info!(url = %config.url, "connecting to deluge");
    let client = DelugeClient::new(DelugeOptions {
        url: config.url.clone(),
        password: config.password.clone(),
        daemon: config.daemon.as_ref().map(|daemon| DaemonAddress {
            host: daemon.host.clone(),
            port: daemon.port,
        }),
        state_dir: config.state_dir.clone(),
        request_timeout,
    })
    .map_err(|err| connection_error("Deluge", &config.url, err))?;
    client
        .connect()
        .await
        .map_err(|err| connection_error("Deluge", &config.url, err))?;
    info!("connected to deluge");
    Ok(client)
}

/// Log in to the qBittorrent Web UI and start tracking session age.
pub(crate) async fn connect_destination(
    config: &QbittorrentConfig,
    request_timeout: Duration,
) -> CliResult<(QbittorrentClient, SessionFreshnessGuard)> {
    info!(url = %config.url, "connecting to qbittorrent");
    let client = QbittorrentClient::new(QbittorrentOptions {
        url: config.url.clone(),
        request_timeout,
    })
    .map_err(|err| connection_error("qBittorrent", &config.url, err))?;
    let guard = SessionFreshnessGuard::establish(&client, config.credentials.clone())
        .await
        .map_err(|err| connection_error("qBittorrent", &config.url, err))?;
    let version = client
        .version()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to read qBittorrent version: {err}")))?;
    info!(
        %version,
        session_timeout_secs = guard.session_timeout().as_secs(),
        "connected to qbittorrent"
    );
    Ok((client, guard))
}

pub(crate) fn selection_mode(config: &MigrationConfig) -> SelectionMode {
    config
        .test_torrent
        .as_ref()
        .map_or(SelectionMode::All, |name| SelectionMode::TestOnly {
            name: name.clone(),
        })
}

pub(crate) const fn migration_settings(config: &MigrationConfig) -> MigrationSettings {
    MigrationSettings {
        auto_delete: config.auto_delete,
        auto_resume: config.auto_resume,
        transfer: config.transfer,
        metadata_wait: PollPolicy::new(config.poll_interval, config.metadata_timeout),
        recheck_wait: PollPolicy::new(config.poll_interval, config.recheck_timeout),
    }
}
