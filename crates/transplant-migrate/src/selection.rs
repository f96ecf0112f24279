//! Choosing which source torrents a run works through.

use std::collections::BTreeMap;

use transplant_torrent_core::{TorrentDescriptor, TorrentId};

/// Which torrents a run should consider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Every torrent in the source inventory.
    #[default]
    All,
    /// Only the first torrent, in hash order, whose name matches exactly.
    TestOnly {
        /// Exact, case-sensitive torrent name.
        name: String,
    },
}

/// Torrents chosen for migration.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Descriptors in id order.
    Torrents(Vec<TorrentDescriptor>),
    /// Test mode matched nothing; the run must not touch any torrent.
    NoTestMatch {
        /// Name that was searched for.
        name: String,
    },
}

/// Apply `mode` to an inventory, visiting torrents in id order.
#[must_use]
pub fn select(inventory: BTreeMap<TorrentId, TorrentDescriptor>, mode: &SelectionMode) -> Selection {
    match mode {
        SelectionMode::All => Selection::Torrents(inventory.into_values().collect()),
        SelectionMode::TestOnly { name } => inventory
            .into_values()
            .find(|descriptor| &descriptor.name == name)
            .map_or_else(
                || Selection::NoTestMatch { name: name.clone() },
                |descriptor| Selection::Torrents(vec![descriptor]),
            ),
    }
}
