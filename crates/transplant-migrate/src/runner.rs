//! Sequential run loop over the selected torrents.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};
use transplant_torrent_core::{
    DestinationClient, SourceClient, TorrentDescriptor, TorrentError, TorrentId,
};
use uuid::Uuid;

use crate::inventory::{fetch_destination_ids, fetch_source_inventory};
use crate::machine::{MigrationSettings, Migrator};
use crate::outcome::{FailureReason, MigrationOutcome};
use crate::selection::{Selection, SelectionMode, select};
use crate::session::{Freshness, SessionFreshnessGuard};

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum RunError {
    /// An inventory listing failed.
    #[error("failed to list {side} torrents")]
    Inventory {
        /// `source` or `destination`.
        side: &'static str,
        /// Client failure.
        #[source]
        source: TorrentError,
    },
    /// The destination session could not be refreshed.
    #[error("failed to refresh destination session")]
    Session {
        /// Client failure.
        #[source]
        source: TorrentError,
    },
    /// A torrent hit a fatal client error.
    #[error("migration of {torrent_id} aborted the run")]
    Torrent {
        /// Torrent being migrated when the run stopped.
        torrent_id: TorrentId,
        /// Client failure.
        #[source]
        source: TorrentError,
    },
}

/// Inputs of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Which torrents to consider.
    pub selection: SelectionMode,
    /// Per-torrent behaviour.
    pub settings: MigrationSettings,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Every selected torrent was processed.
    Completed,
    /// Test mode found no torrent with the configured name.
    NoTestMatch {
        /// Name that was searched for.
        name: String,
    },
}

/// Result of one torrent within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentReport {
    /// Torrent hash.
    pub id: TorrentId,
    /// Torrent name at the source.
    pub name: String,
    /// What happened.
    pub outcome: MigrationOutcome,
}

/// Everything a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Identifier attached to every log line of the run.
    pub run_id: Uuid,
    /// How the run ended.
    pub status: RunStatus,
    /// Torrents found at the source.
    pub source_count: usize,
    /// Torrents found at the destination before the run.
    pub destination_count: usize,
    /// Per-torrent results in processing order.
    pub reports: Vec<TorrentReport>,
}

impl RunSummary {
    fn count(&self, label: &str) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.label() == label)
            .count()
    }

    /// Torrents already present at the destination.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count("skipped")
    }

    /// Torrents migrated and finalized.
    #[must_use]
    pub fn finalized(&self) -> usize {
        self.count("finalized")
    }

    /// Torrents left for manual review.
    #[must_use]
    pub fn mismatched(&self) -> usize {
        self.count("mismatch")
    }

    /// Torrents whose migration stopped early.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count("failed")
    }
}

/// Read-only view of what a run would process.
#[derive(Debug, Clone, PartialEq)]
pub struct Survey {
    /// Selected torrents.
    pub selection: Selection,
    /// Hashes already present at the destination.
    pub present: HashSet<TorrentId>,
    /// Torrents found at the source.
    pub source_count: usize,
    /// Torrents found at the destination.
    pub destination_count: usize,
}

impl Survey {
    /// Selected torrents paired with whether the destination already has them.
    #[must_use]
    pub fn entries(&self) -> Vec<(&TorrentDescriptor, bool)> {
        match &self.selection {
            Selection::Torrents(torrents) => torrents
                .iter()
                .map(|descriptor| (descriptor, self.present.contains(&descriptor.id)))
                .collect(),
            Selection::NoTestMatch { .. } => Vec::new(),
        }
    }
}

/// Snapshot both daemons and apply the selection without mutating anything.
///
/// # Errors
///
/// Returns [`RunError::Inventory`] when either listing fails.
pub async fn survey(
    source: &dyn SourceClient,
    destination: &dyn DestinationClient,
    mode: &SelectionMode,
) -> Result<Survey, RunError> {
    let inventory = fetch_source_inventory(source)
        .await
        .map_err(|source| RunError::Inventory {
            side: "source",
            source,
        })?;
    let present = fetch_destination_ids(destination)
        .await
        .map_err(|source| RunError::Inventory {
            side: "destination",
            source,
        })?;
    info!(
        source_count = inventory.len(),
        destination_count = present.len(),
        "inventories fetched"
    );
    Ok(Survey {
        source_count: inventory.len(),
        selection: select(inventory, mode),
        destination_count: present.len(),
        present,
    })
}

/// Migrate every selected torrent, one at a time.
///
/// # Errors
///
/// Returns a [`RunError`] for inventory failures, session refresh failures,
/// and fatal client errors; per-torrent failures are recorded in the summary.
pub async fn run_migration(
    source: &dyn SourceClient,
    destination: &dyn DestinationClient,
    guard: &mut SessionFreshnessGuard,
    options: &RunOptions,
) -> Result<RunSummary, RunError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id);
    async move {
        let survey = survey(source, destination, &options.selection).await?;
        let mut summary = RunSummary {
            run_id,
            status: RunStatus::Completed,
            source_count: survey.source_count,
            destination_count: survey.destination_count,
            reports: Vec::new(),
        };

        let torrents = match survey.selection {
            Selection::Torrents(torrents) => torrents,
            Selection::NoTestMatch { name } => {
                warn!(test_torrent = %name, "test torrent not found at source; nothing migrated");
                summary.status = RunStatus::NoTestMatch { name };
                return Ok(summary);
            }
        };

        let mut existing = survey.present;
        let migrator = Migrator::new(source, destination, &options.settings);
        for descriptor in &torrents {
            if guard
                .ensure_fresh(destination)
                .await
                .map_err(|source| RunError::Session { source })?
                == Freshness::Refreshed
            {
                info!(torrent_id = %descriptor.id, "re-authenticated before migrating");
            }

            let outcome = migrator
                .migrate(descriptor, &existing)
                .await
                .map_err(|source| RunError::Torrent {
                    torrent_id: descriptor.id.clone(),
                    source,
                })?;

            match &outcome {
                MigrationOutcome::Skipped(_) => {}
                MigrationOutcome::Failed(reason) => {
                    warn!(torrent_id = %descriptor.id, name = %descriptor.name, reason = %reason, "migration failed");
                    if matches!(reason, FailureReason::SessionExpired { .. }) {
                        guard.mark_stale();
                    }
                    existing.insert(descriptor.id.clone());
                }
                MigrationOutcome::Finalized { .. } | MigrationOutcome::Mismatch { .. } => {
                    existing.insert(descriptor.id.clone());
                }
            }

            summary.reports.push(TorrentReport {
                id: descriptor.id.clone(),
                name: descriptor.name.clone(),
                outcome,
            });
        }

        info!(
            selected = torrents.len(),
            finalized = summary.finalized(),
            mismatched = summary.mismatched(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "migration run finished"
        );
        Ok(summary)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use transplant_test_support::fixtures::descriptor;
    use transplant_test_support::mocks::{FakeDestination, FakeSource, Payload};
    use transplant_torrent_core::Credentials;

    use crate::wait::PollPolicy;

    fn options() -> RunOptions {
        RunOptions {
            selection: SelectionMode::All,
            settings: MigrationSettings {
                recheck_wait: PollPolicy::new(Duration::from_millis(1), Duration::from_millis(200)),
                ..MigrationSettings::default()
            },
        }
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_on_next_torrent() {
        let first = descriptor("a1", "First", &["one"]);
        let second = descriptor("a2", "Second", &["two"]);
        let source = FakeSource::with_torrents([first.clone(), second.clone()]);
        let destination = FakeDestination::default();
        destination.stage_payload(&first.id, Payload::new("First", &["one"]));
        destination.stage_payload(&second.id, Payload::new("Second", &["two"]));
        let mut guard = SessionFreshnessGuard::establish(&destination, Credentials::new("u", "p"))
            .await
            .expect("session");
        destination.expire_session_on("recheck");

        let summary = run_migration(&source, &destination, &mut guard, &options())
            .await
            .expect("run");

        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.finalized(), 1);
        assert_eq!(destination.logins(), 2);
    }

    #[tokio::test]
    async fn source_listing_failure_is_reported() {
        let source = FakeSource::default();
        source.go_offline();
        let destination = FakeDestination::default();
        let mut guard = SessionFreshnessGuard::new(Credentials::default(), Duration::from_secs(60));

        let error = run_migration(&source, &destination, &mut guard, &options())
            .await
            .expect_err("offline");
        assert!(matches!(error, RunError::Inventory { side: "source", .. }));
    }

    #[tokio::test]
    async fn survey_marks_present_torrents() {
        let present = descriptor("b1", "Present", &["p"]);
        let missing = descriptor("b2", "Missing", &["m"]);
        let source = FakeSource::with_torrents([present.clone(), missing]);
        let destination = FakeDestination::default();
        destination.insert(transplant_test_support::mocks::destination_handle(
            &present.id,
            "Present",
            transplant_torrent_core::Progress::COMPLETE,
        ));

        let survey = survey(&source, &destination, &SelectionMode::All)
            .await
            .expect("survey");
        let flags: Vec<_> = survey
            .entries()
            .into_iter()
            .map(|(descriptor, present)| (descriptor.name.clone(), present))
            .collect();
        assert_eq!(
            flags,
            vec![("Present".to_string(), true), ("Missing".to_string(), false)]
        );
        assert!(source.calls().iter().all(|call| matches!(
            call,
            transplant_test_support::mocks::SourceCall::List
        )));
    }
}
