//! Web API v2 payloads as qBittorrent serialises them.

use serde::Deserialize;
use transplant_torrent_core::{
    DestinationFile, DestinationState, DestinationTorrent, FilePriority, Progress, TorrentId,
};

/// Session lifetime qBittorrent applies when the preference is absent.
const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3600;

/// Entry of `torrents/info`.
#[derive(Debug, Deserialize)]
pub(crate) struct QbTorrentEntry {
    pub(crate) hash: String,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) save_path: String,
    #[serde(default)]
    pub(crate) category: String,
    /// Fraction in `[0, 1]`.
    #[serde(default)]
    pub(crate) progress: f64,
    #[serde(default)]
    pub(crate) state: String,
}

impl QbTorrentEntry {
    pub(crate) fn into_destination(self) -> DestinationTorrent {
        DestinationTorrent {
            id: TorrentId::new(&self.hash),
            state: parse_state(&self.state),
            progress: Progress::from_fraction(self.progress),
            name: self.name,
            save_path: self.save_path,
            category: self.category,
        }
    }
}

/// Entry of `torrents/files`. Releases before 4.2 omit `index`.
#[derive(Debug, Deserialize)]
pub(crate) struct QbFileEntry {
    #[serde(default)]
    pub(crate) index: Option<u32>,
    pub(crate) name: String,
    #[serde(default = "normal_priority")]
    pub(crate) priority: i64,
}

const fn normal_priority() -> i64 {
    1
}

/// Convert a file listing, falling back to list position for missing indices.
pub(crate) fn into_destination_files(entries: Vec<QbFileEntry>) -> Vec<DestinationFile> {
    entries
        .into_iter()
        .zip(0_u32..)
        .map(|(entry, position)| DestinationFile {
            index: entry.index.unwrap_or(position),
            name: entry.name,
            priority: FilePriority::from_level(entry.priority),
        })
        .collect()
}

/// Subset of `app/preferences` the migration cares about.
#[derive(Debug, Deserialize)]
pub(crate) struct QbPreferences {
    #[serde(default = "default_session_timeout")]
    pub(crate) web_ui_session_timeout: u64,
}

const fn default_session_timeout() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

/// Value of the `torrents/categories` map.
#[derive(Debug, Deserialize)]
pub(crate) struct QbCategory {
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default, rename = "savePath")]
    pub(crate) save_path: String,
}

/// Map a qBittorrent state label onto [`DestinationState`].
pub(crate) fn parse_state(raw: &str) -> DestinationState {
    match raw {
        "checkingUP" | "checkingDL" => DestinationState::Checking,
        "checkingResumeData" => DestinationState::CheckingResumeData,
        "metaDL" | "forcedMetaDL" => DestinationState::FetchingMetadata,
        "allocating" => DestinationState::Allocating,
        "downloading" | "forcedDL" => DestinationState::Downloading,
        "uploading" | "forcedUP" => DestinationState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => DestinationState::Paused,
        "queuedDL" | "queuedUP" => DestinationState::Queued,
        "stalledDL" | "stalledUP" => DestinationState::Stalled,
        "moving" => DestinationState::Moving,
        "missingFiles" => DestinationState::MissingFiles,
        "error" => DestinationState::Error,
        other => DestinationState::Unknown(other.to_string()),
    }
}
