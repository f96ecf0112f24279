#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! TOML configuration for the migration tool.
//!
//! Layout: `model.rs` (raw file sections and the validated `AppConfig`),
//! `validate.rs` (section checks and conversions), `loader.rs` (file access),
//! `error.rs` (`ConfigError`).

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{DEFAULT_CONFIG_PATH, EXAMPLE_CONFIG_PATH, load_config, parse_config};
pub use model::{
    AppConfig, ConfigOverrides, DaemonEndpoint, DelugeConfig, LoggingSettings, MigrationConfig,
    QbittorrentConfig, RawConfig,
};
