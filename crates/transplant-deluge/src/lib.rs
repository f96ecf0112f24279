#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Deluge source adapter speaking the Web UI JSON-RPC protocol.
//! Layout: client.rs (session handling + `SourceClient`), rpc.rs (envelopes and host parsing).

mod client;
mod rpc;

pub use client::{DaemonAddress, DelugeClient, DelugeOptions};
