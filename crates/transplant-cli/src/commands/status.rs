//! `transplant status`: read-only view of what a migration would do.

use tracing::info;
use transplant_config::AppConfig;
use transplant_migrate::survey;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult, connect_destination, connect_source, selection_mode};
use crate::output::render_survey;

pub(crate) async fn handle_status(config: &AppConfig, format: OutputFormat) -> CliResult<()> {
    let request_timeout = config.migration.request_timeout;
    let source = connect_source(&config.deluge, request_timeout).await?;
    let (destination, _guard) = connect_destination(&config.qbittorrent, request_timeout).await?;

    let survey = survey(&source, &destination, &selection_mode(&config.migration))
        .await
        .map_err(CliError::failure)?;
    info!(selected = survey.entries().len(), "survey complete");
    render_survey(&survey, format)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::{Value, json};
    use transplant_config::{
        DelugeConfig, LoggingSettings, MigrationConfig, QbittorrentConfig,
    };
    use transplant_migrate::SOURCE_FIELDS;
    use transplant_telemetry::LogFormat;
    use transplant_torrent_core::{Credentials, TransferStrategy};

    pub(crate) fn config(deluge: &MockServer, qbittorrent: &MockServer) -> AppConfig {
        AppConfig {
            deluge: DelugeConfig {
                url: deluge.base_url().parse().expect("deluge url"),
                password: "deluge".into(),
                daemon: None,
                state_dir: None,
            },
            qbittorrent: QbittorrentConfig {
                url: qbittorrent.base_url().parse().expect("qbittorrent url"),
                credentials: Credentials::new("admin", "adminadmin"),
            },
            migration: MigrationConfig {
                test_torrent: None,
                auto_delete: false,
                auto_resume: false,
                transfer: TransferStrategy::Magnet,
                poll_interval: Duration::from_millis(10),
                metadata_timeout: Duration::from_millis(100),
                recheck_timeout: Duration::from_millis(100),
                request_timeout: Duration::from_secs(5),
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: LogFormat::Pretty,
            },
        }
    }

    fn rpc(method: &str, params: Value, id: u64) -> Value {
        json!({ "method": method, "params": params, "id": id })
    }

    fn reply(result: Value) -> Value {
        json!({ "id": 0, "result": result, "error": null })
    }

    /// Deluge Web UI that accepts the login and lists `torrents`.
    pub(crate) fn mock_deluge(server: &MockServer, torrents: Value) {
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(rpc("auth.login", json!(["deluge"]), 1));
            then.status(200).json_body(reply(json!(true)));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(rpc("web.connected", json!([]), 2));
            then.status(200).json_body(reply(json!(true)));
        });
        server.mock(|when, then| {
            when.method(POST).path("/json").json_body(rpc(
                "core.get_torrents_status",
                json!([{}, SOURCE_FIELDS]),
                3,
            ));
            then.status(200).json_body(reply(torrents));
        });
    }

    /// qBittorrent Web UI that accepts the login and lists `torrents`.
    pub(crate) fn mock_qbittorrent(server: &MockServer, torrents: Value) {
        server.mock(|when, then| {
            when.method(POST).path("/api/v2/auth/login");
            then.status(200).body("Ok.");
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/app/preferences");
            then.status(200)
                .json_body(json!({ "web_ui_session_timeout": 3600 }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/app/version");
            then.status(200).body("v5.0.2");
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/torrents/info");
            then.status(200).json_body(torrents);
        });
    }

    pub(crate) fn deluge_record(name: &str) -> Value {
        json!({
            "name": name,
            "save_path": "/data",
            "label": "",
            "paused": false,
            "state": "Seeding",
            "progress": 100.0,
            "files": [{ "index": 0, "path": format!("{name}.iso"), "size": 1024, "offset": 0 }],
            "file_priorities": [1],
            "trackers": []
        })
    }

    #[tokio::test]
    async fn status_surveys_both_daemons() {
        let deluge = MockServer::start_async().await;
        let qbittorrent = MockServer::start_async().await;
        mock_deluge(
            &deluge,
            json!({ "aa": deluge_record("Alpha"), "bb": deluge_record("Beta") }),
        );
        mock_qbittorrent(
            &qbittorrent,
            json!([{
                "hash": "aa",
                "name": "Alpha",
                "save_path": "/data",
                "category": "",
                "progress": 1.0,
                "state": "uploading"
            }]),
        );

        handle_status(&config(&deluge, &qbittorrent), OutputFormat::Json)
            .await
            .map_err(|err| err.display_message())
            .expect("status");
    }

    #[tokio::test]
    async fn unreachable_source_fails_the_command() {
        let qbittorrent = MockServer::start_async().await;
        let mut config = config(&qbittorrent, &qbittorrent);
        config.deluge.url = "http://127.0.0.1:9/".parse().expect("url");

        let error = handle_status(&config, OutputFormat::Table)
            .await
            .expect_err("nothing listens");
        assert_eq!(error.exit_code(), 3);
        assert!(error.display_message().starts_with("cannot connect to Deluge"));
    }
}
