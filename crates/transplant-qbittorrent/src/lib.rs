#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! qBittorrent destination adapter speaking the Web API v2.
//! Layout: client.rs (session handling + `DestinationClient`), wire.rs (response payloads and state mapping).

mod client;
mod wire;

pub use client::{QbittorrentClient, QbittorrentOptions};
