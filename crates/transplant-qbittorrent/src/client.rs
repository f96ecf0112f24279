//! qBittorrent Web API client implementing [`DestinationClient`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use transplant_torrent_core::{
    AddStatus, AddTorrent, Credentials, DestinationClient, DestinationFile, DestinationTorrent,
    FilePriority, TorrentError, TorrentId, TorrentResult, TorrentSource,
};
use url::Url;

use crate::wire::{QbCategory, QbFileEntry, QbPreferences, QbTorrentEntry, into_destination_files};

const LOGIN_REJECTED: &str = "Fails.";

/// Connection settings for [`QbittorrentClient`].
#[derive(Debug, Clone)]
pub struct QbittorrentOptions {
    /// Web UI base URL, e.g. `http://127.0.0.1:8080`.
    pub url: Url,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Cookie-authenticated client for the qBittorrent Web API v2.
pub struct QbittorrentClient {
    http: Client,
    base: Url,
}

impl QbittorrentClient {
    /// Build a client; no request is sent until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::Connectivity`] when the HTTP client cannot be built.
    pub fn new(options: QbittorrentOptions) -> TorrentResult<Self> {
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
        Ok(Self { http, base })
    }

    /// Application version reported by the Web UI.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::SessionExpired`] without a valid session.
    pub async fn version(&self) -> TorrentResult<String> {
        let response = self
            .send("app/version", self.http.get(self.endpoint("app/version")?))
            .await?;
        let response = Self::ensure_success("app/version", None, response)?;
        let body = Self::text("app/version", response).await?;
        Ok(body.trim().to_string())
    }

    fn endpoint(&self, path: &str) -> TorrentResult<Url> {
        self.base
            .join(&format!("api/v2/{path}"))
            .map_err(|err| TorrentError::connectivity("build_url", err))
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> TorrentResult<Response> {
        request
            .send()
            .await
            .map_err(|err| TorrentError::connectivity(operation, err))
    }

    /// Map HTTP failures: 403 is a lapsed session, 404 with a torrent in scope is a missing torrent.
    fn ensure_success(
        operation: &'static str,
        id: Option<&TorrentId>,
        response: Response,
    ) -> TorrentResult<Response> {
        match (response.status(), id) {
            (StatusCode::FORBIDDEN, _) => Err(TorrentError::SessionExpired { operation }),
            (StatusCode::NOT_FOUND, Some(id)) => Err(TorrentError::NotFound {
                torrent_id: id.clone(),
            }),
            _ => response
                .error_for_status()
                .map_err(|err| TorrentError::operation(operation, id, err)),
        }
    }

    async fn text(operation: &'static str, response: Response) -> TorrentResult<String> {
        response
            .text()
            .await
            .map_err(|err| TorrentError::invalid_response(operation, err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        id: Option<&TorrentId>,
        query: &[(&str, &str)],
    ) -> TorrentResult<T> {
        let request = self.http.get(self.endpoint(operation)?).query(query);
        let response = Self::ensure_success(operation, id, self.send(operation, request).await?)?;
        let body = Self::text(operation, response).await?;
        serde_json::from_str(&body)
            .map_err(|err| TorrentError::invalid_response(operation, err.to_string()))
    }

    async fn command(
        &self,
        operation: &'static str,
        id: Option<&TorrentId>,
        form: &[(&str, &str)],
    ) -> TorrentResult<()> {
        let request = self.http.post(self.endpoint(operation)?).form(form);
        Self::ensure_success(operation, id, self.send(operation, request).await?)?;
        Ok(())
    }

    /// Send a v4 command, retrying under its v5 name when the endpoint is unknown.
    async fn command_with_fallback(
        &self,
        operation: &'static str,
        fallback: &'static str,
        id: &TorrentId,
    ) -> TorrentResult<()> {
        let form = [("hashes", id.as_str())];
        let request = self.http.post(self.endpoint(operation)?).form(&form);
        let response = self.send(operation, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(operation, fallback, "endpoint missing; using newer api name");
            return self.command(fallback, Some(id), &form).await;
        }
        Self::ensure_success(operation, Some(id), response)?;
        Ok(())
    }

    fn add_form(request: &AddTorrent) -> TorrentResult<Form> {
        let paused = request.start_paused.to_string();
        let mut form = Form::new()
            .text("savepath", request.save_path.clone())
            .text("paused", paused.clone())
            .text("stopped", paused)
            .text("autoTMM", request.auto_managed.to_string())
            .text("contentLayout", "Original");
        if let Some(category) = &request.category {
            form = form.text("category", category.clone());
        }
        form = match &request.source {
            TorrentSource::Magnet { uri } => form.text("urls", uri.clone()),
            TorrentSource::Metainfo { bytes } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(format!("{}.torrent", request.id))
                    .mime_str("application/x-bittorrent")
                    .map_err(|err| TorrentError::operation("torrents/add", Some(&request.id), err))?;
                form.part("torrents", part)
            }
        };
        Ok(form)
    }
}

#[async_trait]
impl DestinationClient for QbittorrentClient {
    async fn list_torrents(&self) -> TorrentResult<Vec<DestinationTorrent>> {
        let entries: Vec<QbTorrentEntry> = self.get_json("torrents/info", None, &[]).await?;
        Ok(entries
            .into_iter()
            .map(QbTorrentEntry::into_destination)
            .collect())
    }

    async fn is_authenticated(&self) -> TorrentResult<bool> {
        let response = self
            .send("app/version", self.http.get(self.endpoint("app/version")?))
            .await?;
        match Self::ensure_success("app/version", None, response) {
            Ok(_) => Ok(true),
            Err(TorrentError::SessionExpired { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn login(&self, credentials: &Credentials) -> TorrentResult<()> {
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let request = self.http.post(self.endpoint("auth/login")?).form(&form);
        let response = self.send("auth/login", request).await?;
        if response.status() == StatusCode::FORBIDDEN {
            warn!("qbittorrent refused the login; the client address may be banned");
            return Err(TorrentError::AuthRejected {
                operation: "auth/login",
            });
        }
        let response = Self::ensure_success("auth/login", None, response)?;
        let body = Self::text("auth/login", response).await?;
        if body.trim() == LOGIN_REJECTED {
            return Err(TorrentError::AuthRejected {
                operation: "auth/login",
            });
        }
        debug!(username = %credentials.username, "qbittorrent session established");
        Ok(())
    }

    async fn session_timeout(&self) -> TorrentResult<Duration> {
        let preferences: QbPreferences = self.get_json("app/preferences", None, &[]).await?;
        Ok(Duration::from_secs(preferences.web_ui_session_timeout))
    }

    async fn add_torrent(&self, request: &AddTorrent) -> TorrentResult<AddStatus> {
        let form = Self::add_form(request)?;
        let http_request = self
            .http
            .post(self.endpoint("torrents/add")?)
            .multipart(form);
        let response = self.send("torrents/add", http_request).await?;
        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(TorrentError::SessionExpired {
                operation: "torrents/add",
            });
        }
        let body = Self::text("torrents/add", response).await?;
        let body = body.trim();
        if status.is_client_error() || body == LOGIN_REJECTED {
            let detail = if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            };
            return Ok(AddStatus::Rejected { detail });
        }
        if !status.is_success() {
            return Err(TorrentError::operation(
                "torrents/add",
                Some(&request.id),
                format!("unexpected status {status}"),
            ));
        }
        Ok(AddStatus::Accepted)
    }

    async fn torrent(&self, id: &TorrentId) -> TorrentResult<Option<DestinationTorrent>> {
        let entries: Vec<QbTorrentEntry> = self
            .get_json("torrents/info", None, &[("hashes", id.as_str())])
            .await?;
        Ok(entries
            .into_iter()
            .map(QbTorrentEntry::into_destination)
            .find(|torrent| &torrent.id == id))
    }

    async fn files(&self, id: &TorrentId) -> TorrentResult<Vec<DestinationFile>> {
        let entries: Vec<QbFileEntry> = self
            .get_json("torrents/files", Some(id), &[("hash", id.as_str())])
            .await?;
        Ok(into_destination_files(entries))
    }

    async fn rename_file(&self, id: &TorrentId, index: u32, new_name: &str) -> TorrentResult<()> {
        let files = self.files(id).await?;
        let current = files
            .iter()
            .find(|file| file.index == index)
            .ok_or_else(|| {
                TorrentError::operation(
                    "torrents/renameFile",
                    Some(id),
                    format!("no file with index {index}"),
                )
            })?;
        if current.name == new_name {
            return Ok(());
        }
        self.command(
            "torrents/renameFile",
            Some(id),
            &[
                ("hash", id.as_str()),
                ("oldPath", current.name.as_str()),
                ("newPath", new_name),
            ],
        )
        .await
    }

    async fn set_file_priority(
        &self,
        id: &TorrentId,
        index: u32,
        priority: FilePriority,
    ) -> TorrentResult<()> {
        let index = index.to_string();
        let level = priority.level().to_string();
        self.command(
            "torrents/filePrio",
            Some(id),
            &[
                ("hash", id.as_str()),
                ("id", index.as_str()),
                ("priority", level.as_str()),
            ],
        )
        .await
    }

    async fn rename_torrent(&self, id: &TorrentId, name: &str) -> TorrentResult<()> {
        self.command(
            "torrents/rename",
            Some(id),
            &[("hash", id.as_str()), ("name", name)],
        )
        .await
    }

    async fn recheck(&self, id: &TorrentId) -> TorrentResult<()> {
        self.command("torrents/recheck", Some(id), &[("hashes", id.as_str())])
            .await
    }

    async fn resume(&self, id: &TorrentId) -> TorrentResult<()> {
        self.command_with_fallback("torrents/resume", "torrents/start", id)
            .await
    }

    async fn pause(&self, id: &TorrentId) -> TorrentResult<()> {
        self.command_with_fallback("torrents/pause", "torrents/stop", id)
            .await
    }

    async fn delete(&self, id: &TorrentId, delete_data: bool) -> TorrentResult<()> {
        let delete_files = delete_data.to_string();
        self.command(
            "torrents/delete",
            Some(id),
            &[("hashes", id.as_str()), ("deleteFiles", delete_files.as_str())],
        )
        .await
    }

    async fn categories(&self) -> TorrentResult<HashSet<String>> {
        let categories: HashMap<String, QbCategory> =
            self.get_json("torrents/categories", None, &[]).await?;
        Ok(categories
            .into_iter()
            .map(|(key, category)| {
                debug!(category = %key, save_path = %category.save_path, "destination category");
                if category.name.is_empty() {
                    key
                } else {
                    category.name
                }
            })
            .collect())
    }

    async fn create_category(&self, name: &str) -> TorrentResult<()> {
        self.command(
            "torrents/createCategory",
            None,
            &[("category", name), ("savePath", "")],
        )
        .await
    }
}
