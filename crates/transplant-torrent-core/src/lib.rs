#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Client-agnostic torrent interfaces and DTOs shared by the migration engine
//! and the daemon adapters.
//!
//! Layout: `model/` (identifiers, descriptors, destination handles),
//! `service/` (source and destination collaborator traits), `error.rs`.

pub mod error;
pub mod model;
pub mod service;

pub use error::{TorrentError, TorrentResult};
pub use model::{
    AddStatus, AddTorrent, Credentials, DestinationFile, DestinationState, DestinationTorrent,
    FilePriority, Progress, TorrentDescriptor, TorrentFile, TorrentId, TorrentSource,
    TransferStrategy,
};
pub use service::{DestinationClient, SourceClient, SourceInventory};
