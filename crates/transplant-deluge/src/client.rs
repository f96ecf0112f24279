//! Deluge Web UI client implementing [`SourceClient`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use transplant_torrent_core::{
    SourceClient, SourceInventory, TorrentDescriptor, TorrentError, TorrentId, TorrentResult,
    TorrentSource, TransferStrategy,
};
use url::Url;

use crate::rpc::{RpcRequest, RpcResponse, parse_hosts};

/// Daemon the Web UI should be attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonAddress {
    /// Daemon host as registered in the Web UI connection manager.
    pub host: String,
    /// Daemon RPC port.
    pub port: u16,
}

/// Connection settings for [`DelugeClient`].
#[derive(Debug, Clone)]
pub struct DelugeOptions {
    /// Web UI base URL, e.g. `http://127.0.0.1:8112`.
    pub url: Url,
    /// Web UI password.
    pub password: String,
    /// Daemon to connect to when the Web UI is not attached yet.
    pub daemon: Option<DaemonAddress>,
    /// Directory holding `<hash>.torrent` state files.
    pub state_dir: Option<PathBuf>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// JSON-RPC client for the Deluge Web UI.
pub struct DelugeClient {
    http: Client,
    endpoint: Url,
    password: String,
    daemon: Option<DaemonAddress>,
    state_dir: Option<PathBuf>,
    next_id: AtomicU64,
}

impl DelugeClient {
    /// Build a client; no request is sent until [`Self::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::Connectivity`] when the HTTP client cannot be
    /// built or the URL cannot carry the RPC path.
    pub fn new(options: DelugeOptions) -> TorrentResult<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(options.request_timeout)
            .build()
            .map_err(|err| TorrentError::connectivity("build_client", err))?;
        let mut base = options.url;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("json")
            .map_err(|err| TorrentError::connectivity("build_client", err))?;
        Ok(Self {
            http,
            endpoint,
            password: options.password,
            daemon: options.daemon,
            state_dir: options.state_dir,
            next_id: AtomicU64::new(1),
        })
    }

    /// Log in and make sure the Web UI is attached to a daemon.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::AuthRejected`] for a wrong password and
    /// [`TorrentError::Connectivity`] when no daemon can be attached.
    pub async fn connect(&self) -> TorrentResult<()> {
        self.login().await?;
        let connected: bool = self.call("web.connected", json!([])).await?;
        if connected {
            debug!("web ui already attached to a daemon");
            return Ok(());
        }

        let hosts_value: Value = self.call("web.get_hosts", json!([])).await?;
        let hosts = parse_hosts(&hosts_value)
            .ok_or_else(|| TorrentError::invalid_response("web.get_hosts", "malformed host list"))?;
        let chosen = match &self.daemon {
            Some(daemon) => hosts
                .iter()
                .find(|entry| entry.matches(&daemon.host, daemon.port)),
            None => hosts.first(),
        }
        .ok_or_else(|| {
            TorrentError::connectivity("web.connect", "no matching daemon registered in the web ui")
        })?;

        let _: Value = self.call("web.connect", json!([chosen.id])).await?;
        info!(host = %chosen.host, port = chosen.port, "attached web ui to deluge daemon");
        Ok(())
    }

    async fn login(&self) -> TorrentResult<()> {
        let accepted: bool = self.call_once("auth.login", json!([self.password])).await?;
        if accepted {
            Ok(())
        } else {
            Err(TorrentError::AuthRejected {
                operation: "auth.login",
            })
        }
    }

    /// Call `method`, logging in again once if the session lapsed.
    async fn call<T: DeserializeOwned>(&self, method: &'static str, params: Value) -> TorrentResult<T> {
        match self.call_once(method, params.clone()).await {
            Err(TorrentError::SessionExpired { .. }) => {
                warn!(method, "deluge session expired; logging in again");
                self.login().await?;
                self.call_once(method, params).await
            }
            other => other,
        }
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> TorrentResult<T> {
        let request = RpcRequest {
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| TorrentError::connectivity(method, err))?
            .error_for_status()
            .map_err(|err| TorrentError::operation(method, None, err))?;
        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|err| TorrentError::invalid_response(method, err.to_string()))?;

        if let Some(fault) = envelope.error {
            if fault.is_not_authenticated() {
                return Err(TorrentError::SessionExpired { operation: method });
            }
            return Err(TorrentError::operation(method, None, fault));
        }
        serde_json::from_value(envelope.result)
            .map_err(|err| TorrentError::invalid_response(method, err.to_string()))
    }

    async fn read_metainfo(&self, id: &TorrentId) -> TorrentResult<Vec<u8>> {
        let state_dir = self.state_dir.as_ref().ok_or(TorrentError::Unsupported {
            operation: "read_metainfo",
        })?;
        let path = state_dir.join(format!("{id}.torrent"));
        debug!(path = %path.display(), "reading metainfo from state directory");
        tokio::fs::read(&path)
            .await
            .map_err(|err| TorrentError::operation("read_metainfo", Some(id), err))
    }
}

#[async_trait]
impl SourceClient for DelugeClient {
    async fn list_torrents(&self, fields: &[&str]) -> TorrentResult<SourceInventory> {
        self.call("core.get_torrents_status", json!([{}, fields]))
            .await
    }

    async fn pause_torrent(&self, id: &TorrentId) -> TorrentResult<()> {
        let _: Value = self
            .call("core.pause_torrent", json!([id.as_str()]))
            .await?;
        Ok(())
    }

    async fn transferable_definition(
        &self,
        descriptor: &TorrentDescriptor,
        strategy: TransferStrategy,
    ) -> TorrentResult<TorrentSource> {
        match strategy {
            TransferStrategy::Metainfo => Ok(TorrentSource::metainfo(
                self.read_metainfo(&descriptor.id).await?,
            )),
            TransferStrategy::Magnet => Ok(TorrentSource::magnet_for(
                &descriptor.id,
                &descriptor.name,
                &descriptor.trackers,
            )),
        }
    }

    async fn remove_torrent(&self, id: &TorrentId, delete_data: bool) -> TorrentResult<()> {
        let removed: bool = self
            .call("core.remove_torrent", json!([id.as_str(), delete_data]))
            .await?;
        if removed {
            Ok(())
        } else {
            Err(TorrentError::operation(
                "core.remove_torrent",
                Some(id),
                "daemon reported the removal as failed",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::MockServer;
    use httpmock::prelude::*;

    fn options(server: &MockServer) -> Result<DelugeOptions> {
        Ok(DelugeOptions {
            url: server.base_url().parse()?,
            password: "deluge".into(),
            daemon: None,
            state_dir: None,
            request_timeout: Duration::from_secs(5),
        })
    }

    fn rpc(method: &str, params: Value, id: u64) -> Value {
        json!({ "method": method, "params": params, "id": id })
    }

    fn reply(result: Value) -> Value {
        json!({ "id": 0, "result": result, "error": null })
    }

    #[tokio::test]
    async fn connect_reuses_attached_daemon() -> Result<()> {
        let server = MockServer::start_async().await;
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(rpc("auth.login", json!(["deluge"]), 1));
            then.status(200).json_body(reply(json!(true)));
        });
        let connected = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(rpc("web.connected", json!([]), 2));
            then.status(200).json_body(reply(json!(true)));
        });

        DelugeClient::new(options(&server)?)?.connect().await?;
        login.assert();
        connected.assert();
        Ok(())
    }

    #[tokio::test]
    async fn connect_attaches_configured_daemon() -> Result<()> {
        let server = MockServer::start_async().await;
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
            then.status(200).json_body(reply(json!(false)));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(rpc("web.get_hosts", json!([]), 3));
            then.status(200).json_body(reply(json!([
                ["abc", "127.0.0.1", 58846, "Online"],
                ["def", "10.0.0.2", 58846, "Online"]
            ])));
        });
        let attach = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(rpc("web.connect", json!(["def"]), 4));
            then.status(200).json_body(reply(json!([])));
        });

        let mut options = options(&server)?;
        options.daemon = Some(DaemonAddress {
            host: "10.0.0.2".into(),
            port: 58846,
        });
        DelugeClient::new(options)?.connect().await?;
        attach.assert();
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/json");
            then.status(200).json_body(reply(json!(false)));
        });

        let error = DelugeClient::new(options(&server)?)?
            .connect()
            .await
            .expect_err("login should fail");
        assert!(matches!(error, TorrentError::AuthRejected { .. }));
        assert!(error.is_fatal());
        Ok(())
    }

    #[tokio::test]
    async fn lists_torrents_with_requested_fields() -> Result<()> {
        let server = MockServer::start_async().await;
        let list = server.mock(|when, then| {
            when.method(POST).path("/json").json_body(rpc(
                "core.get_torrents_status",
                json!([{}, ["name", "progress"]]),
                1,
            ));
            then.status(200).json_body(reply(json!({
                "abcdef": { "name": "demo", "progress": 100.0 }
            })));
        });

        let client = DelugeClient::new(options(&server)?)?;
        let inventory = client.list_torrents(&["name", "progress"]).await?;
        list.assert();
        assert_eq!(inventory["abcdef"]["name"], "demo");
        Ok(())
    }

    #[tokio::test]
    async fn daemon_errors_become_operation_failures() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/json");
            then.status(200).json_body(json!({
                "id": 1,
                "result": null,
                "error": { "message": "Torrent not found", "code": 4 }
            }));
        });

        let client = DelugeClient::new(options(&server)?)?;
        let error = client
            .pause_torrent(&TorrentId::new("abcdef"))
            .await
            .expect_err("pause should fail");
        assert!(matches!(
            error,
            TorrentError::OperationFailed {
                operation: "core.pause_torrent",
                ..
            }
        ));
        assert!(!error.is_fatal());
        Ok(())
    }

    #[tokio::test]
    async fn expired_session_logs_in_again() -> Result<()> {
        let server = MockServer::start_async().await;
        let first = server.mock(|when, then| {
            when.method(POST).path("/json").json_body(rpc(
                "core.remove_torrent",
                json!(["abcdef", false]),
                1,
            ));
            then.status(200).json_body(json!({
                "id": 1,
                "result": null,
                "error": { "message": "Not authenticated", "code": 1 }
            }));
        });
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(rpc("auth.login", json!(["deluge"]), 2));
            then.status(200).json_body(reply(json!(true)));
        });
        let retry = server.mock(|when, then| {
            when.method(POST).path("/json").json_body(rpc(
                "core.remove_torrent",
                json!(["abcdef", false]),
                3,
            ));
            then.status(200).json_body(reply(json!(true)));
        });

        let client = DelugeClient::new(options(&server)?)?;
        client
            .remove_torrent(&TorrentId::new("ABCDEF"), false)
            .await?;
        first.assert();
        login.assert();
        retry.assert();
        Ok(())
    }

    #[tokio::test]
    async fn metainfo_is_read_from_state_dir() -> Result<()> {
        let server = MockServer::start_async().await;
        let state = tempfile::tempdir()?;
        std::fs::write(state.path().join("abcdef.torrent"), b"d4:infodee")?;

        let mut options = options(&server)?;
        options.state_dir = Some(state.path().to_path_buf());
        let client = DelugeClient::new(options)?;

        let mut descriptor = TorrentDescriptor {
            id: TorrentId::new("ABCDEF"),
            name: "demo".into(),
            save_path: "/data".into(),
            label: None,
            paused: true,
            progress: transplant_torrent_core::Progress::COMPLETE,
            files: Vec::new(),
            trackers: Vec::new(),
        };
        let source = client
            .transferable_definition(&descriptor, TransferStrategy::Metainfo)
            .await?;
        assert_eq!(source, TorrentSource::metainfo(b"d4:infodee".to_vec()));

        descriptor.id = TorrentId::new("ffff");
        let missing = client
            .transferable_definition(&descriptor, TransferStrategy::Metainfo)
            .await
            .expect_err("missing state file");
        assert!(matches!(
            missing,
            TorrentError::OperationFailed {
                operation: "read_metainfo",
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_web_ui_is_a_connectivity_failure() -> Result<()> {
        let client = DelugeClient::new(DelugeOptions {
            url: "http://127.0.0.1:9/".parse()?,
            password: "deluge".into(),
            daemon: None,
            state_dir: None,
            request_timeout: Duration::from_secs(2),
        })?;
        let error = client.connect().await.expect_err("nothing listens");
        assert!(error.is_fatal());
        Ok(())
    }
}
