#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Migration engine moving torrents from a source daemon to a destination daemon.
//! Layout: inventory.rs (snapshots + record decoding), selection.rs, session.rs (freshness guard),
//! wait.rs (bounded polling), recheck.rs, progress.rs, machine.rs (per-torrent state machine),
//! outcome.rs, runner.rs (run loop + summary).

pub mod inventory;
pub mod machine;
pub mod outcome;
pub mod progress;
pub mod recheck;
pub mod runner;
pub mod selection;
pub mod session;
pub mod wait;

pub use inventory::{SOURCE_FIELDS, decode_descriptor, fetch_destination_ids, fetch_source_inventory};
pub use machine::{METAINFO_RESOLVE_WAIT, MigrationSettings, Migrator};
pub use outcome::{FailureReason, MigrationOutcome, MigrationStage, SkipReason};
pub use progress::{PROGRESS_TOLERANCE, ProgressVerdict, reconcile};
pub use recheck::{RecheckOutcome, wait_for_recheck};
pub use runner::{
    RunError, RunOptions, RunStatus, RunSummary, Survey, TorrentReport, run_migration, survey,
};
pub use selection::{Selection, SelectionMode, select};
pub use session::{Freshness, REFRESH_RATIO, SessionFreshnessGuard};
pub use wait::{PollPolicy, WaitOutcome, wait_until};
