//! Collaborator traits implemented by the source and destination adapters.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{TorrentError, TorrentResult};
use crate::model::{
    AddStatus, AddTorrent, Credentials, DestinationFile, DestinationTorrent, FilePriority,
    TorrentDescriptor, TorrentId, TorrentSource, TransferStrategy,
};

/// Raw status records keyed by the hash the source reported, before decoding.
pub type SourceInventory = HashMap<String, Value>;

/// Daemon torrents are migrated away from.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch the requested status fields for every torrent.
    async fn list_torrents(&self, fields: &[&str]) -> TorrentResult<SourceInventory>;

    /// Pause a torrent so its on-disk state stops changing.
    async fn pause_torrent(&self, id: &TorrentId) -> TorrentResult<()>;

    /// Produce something the destination can admit, using the given strategy.
    async fn transferable_definition(
        &self,
        descriptor: &TorrentDescriptor,
        strategy: TransferStrategy,
    ) -> TorrentResult<TorrentSource>;

    /// Remove a torrent, optionally deleting its payload.
    async fn remove_torrent(&self, id: &TorrentId, delete_data: bool) -> TorrentResult<()>;
}

/// Daemon torrents are migrated into.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Snapshot every torrent the destination holds.
    async fn list_torrents(&self) -> TorrentResult<Vec<DestinationTorrent>>;

    /// Whether the current session is still accepted.
    async fn is_authenticated(&self) -> TorrentResult<bool>;

    /// Establish a fresh session.
    async fn login(&self, credentials: &Credentials) -> TorrentResult<()>;

    /// Idle time after which the destination drops a session.
    async fn session_timeout(&self) -> TorrentResult<Duration>;

    /// Admit a torrent.
    async fn add_torrent(&self, request: &AddTorrent) -> TorrentResult<AddStatus>;

    /// Fetch a single torrent, `None` when it is absent.
    async fn torrent(&self, id: &TorrentId) -> TorrentResult<Option<DestinationTorrent>>;

    /// Fetch the file list of a torrent; empty while metadata is unresolved.
    async fn files(&self, id: &TorrentId) -> TorrentResult<Vec<DestinationFile>>;

    /// Rename the file at `index` to `new_name`.
    async fn rename_file(&self, id: &TorrentId, index: u32, new_name: &str) -> TorrentResult<()>;

    /// Set the download priority of the file at `index`.
    async fn set_file_priority(
        &self,
        id: &TorrentId,
        index: u32,
        priority: FilePriority,
    ) -> TorrentResult<()>;

    /// Rename the torrent itself.
    async fn rename_torrent(&self, id: &TorrentId, name: &str) -> TorrentResult<()>;

    /// Force a recheck of on-disk data.
    async fn recheck(&self, id: &TorrentId) -> TorrentResult<()>;

    /// Resume a paused torrent.
    async fn resume(&self, id: &TorrentId) -> TorrentResult<()>;

    /// Pause a torrent.
    async fn pause(&self, id: &TorrentId) -> TorrentResult<()>;

    /// Remove a torrent, optionally deleting its payload.
    async fn delete(&self, id: &TorrentId, delete_data: bool) -> TorrentResult<()>;

    /// Names of the categories the destination knows; default reports lack of support.
    async fn categories(&self) -> TorrentResult<HashSet<String>> {
        Err(TorrentError::Unsupported {
            operation: "categories",
        })
    }

    /// Create a category; default reports lack of support.
    async fn create_category(&self, name: &str) -> TorrentResult<()> {
        let _ = name;
        Err(TorrentError::Unsupported {
            operation: "create_category",
        })
    }
}
