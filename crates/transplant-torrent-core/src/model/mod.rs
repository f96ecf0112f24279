//! Core torrent domain types and DTOs shared across the workspace.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Content hash identifying a torrent, normalised to lower case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentId(String);

impl TorrentId {
    /// Normalise a raw hash into an identifier; comparison is case-insensitive.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// Borrow the normalised hash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TorrentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl AsRef<str> for TorrentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TorrentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Completion percentage on the canonical 0-100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(f64);

impl Progress {
    /// Fully downloaded.
    pub const COMPLETE: Self = Self(100.0);

    /// Ingest a value reported as a percentage (0-100).
    #[must_use]
    pub fn from_percent(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 100.0))
        }
    }

    /// Ingest a value reported as a fraction (0-1).
    #[must_use]
    pub fn from_fraction(value: f64) -> Self {
        Self::from_percent(value * 100.0)
    }

    /// Percentage value in `[0, 100]`.
    #[must_use]
    pub const fn as_percent(self) -> f64 {
        self.0
    }

    /// Absolute difference in percentage points.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.0 - other.0).abs()
    }
}

impl Display for Progress {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.2}%", self.0)
    }
}

/// Binary download priority shared by source and destination.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Do not download the file.
    Skip,
    /// Download the file.
    #[default]
    Normal,
}

impl FilePriority {
    /// Collapse a numeric priority level onto the binary scale; zero means skip.
    #[must_use]
    pub const fn from_level(level: i64) -> Self {
        if level <= 0 { Self::Skip } else { Self::Normal }
    }

    /// Numeric level understood by the destination (0 skip, 1 normal).
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Skip => 0,
            Self::Normal => 1,
        }
    }
}

/// Individual file of a source torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Index of the file within the torrent metainfo; the join key with the destination.
    pub index: u32,
    /// Relative path of the file within the torrent payload.
    pub path: String,
    /// Download priority at the source.
    pub priority: FilePriority,
}

/// Typed view of a torrent held by the source daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentDescriptor {
    /// Content hash.
    pub id: TorrentId,
    /// Torrent-level display name.
    pub name: String,
    /// Directory the payload lives under.
    pub save_path: String,
    /// Optional label, migrated as the destination category.
    pub label: Option<String>,
    /// Whether the source currently has the torrent paused.
    pub paused: bool,
    /// Completion on the canonical percentage scale.
    pub progress: Progress,
    /// Files in metainfo order.
    pub files: Vec<TorrentFile>,
    /// Tracker announce URLs in tier order.
    #[serde(default)]
    pub trackers: Vec<String>,
}

impl TorrentDescriptor {
    /// Label with surrounding whitespace removed, or `None` when blank.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
    }
}

/// Lifecycle state reported by the destination daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationState {
    /// Piece data is being verified against the metainfo.
    Checking,
    /// Fast-resume data is being verified at startup.
    CheckingResumeData,
    /// Metadata is still being fetched from peers.
    FetchingMetadata,
    /// Disk space is being allocated.
    Allocating,
    /// Actively downloading.
    Downloading,
    /// Download complete and seeding.
    Seeding,
    /// Paused or stopped by the user.
    Paused,
    /// Waiting in the queue.
    Queued,
    /// Active but no data flowing.
    Stalled,
    /// Storage is being relocated.
    Moving,
    /// Payload files are missing on disk.
    MissingFiles,
    /// The daemon reports an error for this torrent.
    Error,
    /// State label the client does not recognise.
    Unknown(String),
}

impl DestinationState {
    /// Whether an integrity check is still running.
    #[must_use]
    pub const fn is_checking(&self) -> bool {
        matches!(self, Self::Checking | Self::CheckingResumeData)
    }

    /// Whether metadata has not been resolved yet.
    #[must_use]
    pub const fn is_fetching_metadata(&self) -> bool {
        matches!(self, Self::FetchingMetadata)
    }
}

/// File entry as reported by the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationFile {
    /// Index of the file within the torrent metainfo.
    pub index: u32,
    /// Current relative path.
    pub name: String,
    /// Current download priority.
    pub priority: FilePriority,
}

/// Live view of a torrent held by the destination daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationTorrent {
    /// Content hash.
    pub id: TorrentId,
    /// Torrent-level display name.
    pub name: String,
    /// Directory the payload lives under.
    pub save_path: String,
    /// Assigned category, empty when none.
    pub category: String,
    /// Completion on the canonical percentage scale.
    pub progress: Progress,
    /// Reported lifecycle state.
    pub state: DestinationState,
}

/// Transferable representation of a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TorrentSource {
    /// Represents a magnet URI that should be fetched.
    Magnet {
        /// Magnet URI to resolve and add.
        uri: String,
    },
    /// Represents raw `.torrent` metainfo bytes.
    Metainfo {
        /// Bencoded metainfo payload.
        bytes: Vec<u8>,
    },
}

impl TorrentSource {
    /// Source handed over as a magnet URI.
    #[must_use]
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self::Magnet { uri: uri.into() }
    }

    /// Source handed over as raw `.torrent` bytes.
    #[must_use]
    pub fn metainfo(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Metainfo {
            bytes: bytes.into(),
        }
    }

    /// Build a magnet URI carrying the hash, display name, and trackers.
    #[must_use]
    pub fn magnet_for(id: &TorrentId, name: &str, trackers: &[String]) -> Self {
        let mut uri = format!("magnet:?xt=urn:btih:{id}");
        if !name.is_empty() {
            uri.push_str("&dn=");
            uri.extend(form_urlencoded::byte_serialize(name.as_bytes()));
        }
        for tracker in trackers.iter().filter(|tracker| !tracker.is_empty()) {
            uri.push_str("&tr=");
            uri.extend(form_urlencoded::byte_serialize(tracker.as_bytes()));
        }
        Self::Magnet { uri }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Magnet { .. } => "magnet",
            Self::Metainfo { .. } => "metainfo",
        }
    }
}

/// How the source hands a torrent over to the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStrategy {
    /// Copy the `.torrent` file out of the source's state directory.
    #[default]
    Metainfo,
    /// Hand over a magnet URI; metadata arrives asynchronously from peers.
    Magnet,
}

impl TransferStrategy {
    /// Whether the destination learns the file list without contacting peers.
    #[must_use]
    pub const fn resolves_immediately(self) -> bool {
        matches!(self, Self::Metainfo)
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metainfo => "metainfo",
            Self::Magnet => "magnet",
        }
    }
}

/// Request payload for admitting a torrent at the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrent {
    /// Identifier the destination is expected to report after admission.
    pub id: TorrentId,
    /// How the torrent should be retrieved.
    pub source: TorrentSource,
    /// Directory the existing payload lives under.
    pub save_path: String,
    /// Whether the torrent should start in a paused state.
    pub start_paused: bool,
    /// Whether the destination may manage save paths on its own.
    pub auto_managed: bool,
    /// Category to assign, if any.
    pub category: Option<String>,
}

impl AddTorrent {
    /// Build the admission request used for migrations: paused, unmanaged, at
    /// the source's save path, with the label as category.
    #[must_use]
    pub fn for_migration(descriptor: &TorrentDescriptor, source: TorrentSource) -> Self {
        Self {
            id: descriptor.id.clone(),
            source,
            save_path: descriptor.save_path.clone(),
            start_paused: true,
            auto_managed: false,
            category: descriptor.category().map(str::to_string),
        }
    }
}

/// Result of an add request as acknowledged by the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddStatus {
    /// The destination accepted the torrent.
    Accepted,
    /// The destination refused the torrent.
    Rejected {
        /// Response body or status explaining the refusal.
        detail: String,
    },
}

/// Username and password for a daemon login.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Secret.
    pub password: String,
}

impl Credentials {
    /// Construct credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
