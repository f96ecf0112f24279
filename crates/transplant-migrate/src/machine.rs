//! Per-torrent migration state machine.
//!
//! A torrent moves through [`MigrationStage`]s in order. Errors classified as
//! fatal by [`TorrentError::is_fatal`] escape to the caller; every other
//! failure ends only this torrent with [`MigrationOutcome::Failed`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{Instrument, debug, info, info_span, warn};
use transplant_torrent_core::{
    AddStatus, AddTorrent, DestinationClient, DestinationFile, SourceClient, TorrentDescriptor,
    TorrentError, TorrentId, TorrentResult, TransferStrategy,
};

use crate::outcome::{FailureReason, MigrationOutcome, MigrationStage, SkipReason};
use crate::progress::{ProgressVerdict, reconcile};
use crate::recheck::{RecheckOutcome, wait_for_recheck};
use crate::wait::{PollPolicy, WaitOutcome, wait_until};

/// Metadata wait used when the destination received the full metainfo.
pub const METAINFO_RESOLVE_WAIT: PollPolicy =
    PollPolicy::new(Duration::from_millis(250), Duration::from_secs(10));

/// Knobs for a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSettings {
    /// Remove verified torrents from the source, keeping their data.
    pub auto_delete: bool,
    /// Resume verified torrents at the destination.
    pub auto_resume: bool,
    /// How torrents are handed to the destination.
    pub transfer: TransferStrategy,
    /// Metadata wait for magnet transfers.
    pub metadata_wait: PollPolicy,
    /// Recheck wait.
    pub recheck_wait: PollPolicy,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            auto_delete: false,
            auto_resume: false,
            transfer: TransferStrategy::default(),
            metadata_wait: PollPolicy::new(Duration::from_secs(2), Duration::from_secs(300)),
            recheck_wait: PollPolicy::new(Duration::from_secs(2), Duration::from_secs(1800)),
        }
    }
}

impl MigrationSettings {
    /// Wait applied between the add request and file reconciliation.
    #[must_use]
    pub const fn metadata_policy(&self) -> PollPolicy {
        if self.transfer.resolves_immediately() {
            METAINFO_RESOLVE_WAIT
        } else {
            self.metadata_wait
        }
    }
}

struct StageError {
    stage: MigrationStage,
    source: TorrentError,
}

type StageResult<T> = Result<T, StageError>;

trait AtStage<T> {
    fn at(self, stage: MigrationStage) -> StageResult<T>;
}

impl<T> AtStage<T> for TorrentResult<T> {
    fn at(self, stage: MigrationStage) -> StageResult<T> {
        self.map_err(|source| StageError { stage, source })
    }
}

/// Tolerate a per-file command failure unless it must end the torrent.
fn tolerate(result: TorrentResult<()>, what: &'static str, index: u32) -> TorrentResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(error) if error.is_fatal() || error.is_session_expired() => Err(error),
        Err(error) => {
            warn!(index, error = %error, "{what} failed; continuing with remaining files");
            Ok(())
        }
    }
}

/// Drives single torrents from the source to the destination.
pub struct Migrator<'a> {
    source: &'a dyn SourceClient,
    destination: &'a dyn DestinationClient,
    settings: &'a MigrationSettings,
}

impl<'a> Migrator<'a> {
    /// Bind the two daemons and run settings.
    #[must_use]
    pub const fn new(
        source: &'a dyn SourceClient,
        destination: &'a dyn DestinationClient,
        settings: &'a MigrationSettings,
    ) -> Self {
        Self {
            source,
            destination,
            settings,
        }
    }

    /// Migrate one torrent unless `existing` already lists it.
    ///
    /// # Errors
    ///
    /// Returns only fatal client errors; everything else is reported through
    /// [`MigrationOutcome::Failed`].
    pub async fn migrate(
        &self,
        descriptor: &TorrentDescriptor,
        existing: &HashSet<TorrentId>,
    ) -> TorrentResult<MigrationOutcome> {
        let span = info_span!("migrate", torrent_id = %descriptor.id, name = %descriptor.name);
        async {
            if existing.contains(&descriptor.id) {
                info!("already present at destination; skipping");
                return Ok(MigrationOutcome::Skipped(SkipReason::AlreadyAtDestination));
            }
            debug!(stage = %MigrationStage::Discovered, files = descriptor.files.len(), progress = %descriptor.progress, "migration started");

            match self.drive(descriptor).await {
                Ok(outcome) => Ok(outcome),
                Err(StageError { stage, source }) if source.is_fatal() => {
                    warn!(stage = %stage, error = %source, "fatal client error");
                    Err(source)
                }
                Err(StageError { stage, source }) => {
                    Ok(MigrationOutcome::Failed(FailureReason::from_error(stage, &source)))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, descriptor: &TorrentDescriptor) -> StageResult<MigrationOutcome> {
        let id = &descriptor.id;

        if !descriptor.paused {
            self.source
                .pause_torrent(id)
                .await
                .at(MigrationStage::PausedAtSource)?;
        }
        debug!(stage = %MigrationStage::PausedAtSource, "source copy paused");

        if let Some(failure) = self.transfer(descriptor).await.at(MigrationStage::Transferred)? {
            return Ok(MigrationOutcome::Failed(failure));
        }

        let policy = self.settings.metadata_policy();
        let Some(files) = self
            .resolve_metadata(id, policy)
            .await
            .at(MigrationStage::MetadataResolved)?
        else {
            warn!(
                waited_secs = policy.timeout.as_secs(),
                "metadata did not resolve; destination entry left for inspection"
            );
            return Ok(MigrationOutcome::Failed(FailureReason::MetadataTimeout {
                waited: policy.timeout,
            }));
        };
        debug!(stage = %MigrationStage::MetadataResolved, files = files.len(), "metadata resolved");

        if let Some(failure) = self
            .reconcile_files(descriptor, &files)
            .await
            .at(MigrationStage::FilesReconciled)?
        {
            return Ok(MigrationOutcome::Failed(failure));
        }

        self.destination
            .recheck(id)
            .await
            .at(MigrationStage::Rechecking)?;
        let handle = match wait_for_recheck(self.destination, id, self.settings.recheck_wait)
            .await
            .at(MigrationStage::Rechecking)?
        {
            RecheckOutcome::Completed(handle) => handle,
            RecheckOutcome::NotFound => {
                warn!("torrent vanished during recheck");
                return Ok(MigrationOutcome::Failed(FailureReason::NotFound {
                    stage: MigrationStage::Rechecking,
                }));
            }
            RecheckOutcome::TimedOut => {
                warn!(
                    waited_secs = self.settings.recheck_wait.timeout.as_secs(),
                    "recheck still running; comparing progress anyway"
                );
                let refreshed = self
                    .destination
                    .torrent(id)
                    .await
                    .at(MigrationStage::Verified)?;
                let Some(handle) = refreshed else {
                    return Ok(MigrationOutcome::Failed(FailureReason::NotFound {
                        stage: MigrationStage::Verified,
                    }));
                };
                handle
            }
        };

        match reconcile(descriptor.progress, handle.progress) {
            ProgressVerdict::Verified => {
                debug!(stage = %MigrationStage::Verified, progress = %handle.progress, "progress verified");
                self.finalize(id).await.at(MigrationStage::Finalized)?;
                info!(progress = %handle.progress, "migration finalized");
                Ok(MigrationOutcome::Finalized {
                    destination_progress: handle.progress,
                })
            }
            ProgressVerdict::Mismatch { diff } => {
                warn!(
                    source_progress = %descriptor.progress,
                    destination_progress = %handle.progress,
                    diff,
                    "progress mismatch; both copies left for manual review"
                );
                Ok(MigrationOutcome::Mismatch { diff })
            }
        }
    }

    async fn transfer(&self, descriptor: &TorrentDescriptor) -> TorrentResult<Option<FailureReason>> {
        if let Some(category) = descriptor.category() {
            self.ensure_category(category).await?;
        }

        let definition = self
            .source
            .transferable_definition(descriptor, self.settings.transfer)
            .await?;
        debug!(kind = definition.kind(), "submitting torrent to destination");
        let request = AddTorrent::for_migration(descriptor, definition);
        match self.destination.add_torrent(&request).await? {
            AddStatus::Accepted => {
                debug!(stage = %MigrationStage::Transferred, "destination accepted torrent");
                Ok(None)
            }
            AddStatus::Rejected { detail } => {
                warn!(detail = %detail, "destination rejected torrent");
                Ok(Some(FailureReason::AddRejected { detail }))
            }
        }
    }

    async fn ensure_category(&self, category: &str) -> TorrentResult<()> {
        let known = match self.destination.categories().await {
            Ok(known) => known,
            Err(TorrentError::Unsupported { .. }) => return Ok(()),
            Err(error) if error.is_fatal() || error.is_session_expired() => return Err(error),
            Err(error) => {
                warn!(category, error = %error, "could not list destination categories");
                return Ok(());
            }
        };
        if known.contains(category) {
            return Ok(());
        }

        match self.destination.create_category(category).await {
            Ok(()) => {
                info!(category, "created destination category");
                Ok(())
            }
            Err(error) if error.is_fatal() || error.is_session_expired() => Err(error),
            Err(error) => {
                warn!(category, error = %error, "category creation failed; adding anyway");
                Ok(())
            }
        }
    }

    async fn resolve_metadata(
        &self,
        id: &TorrentId,
        policy: PollPolicy,
    ) -> TorrentResult<Option<Vec<DestinationFile>>> {
        let destination = self.destination;
        let outcome = wait_until(
            move || async move {
                if destination.torrent(id).await?.is_none() {
                    return Ok(None);
                }
                let files = destination.files(id).await?;
                Ok::<_, TorrentError>((!files.is_empty()).then_some(files))
            },
            policy,
        )
        .await?;
        Ok(match outcome {
            WaitOutcome::Completed(files) => Some(files),
            WaitOutcome::TimedOut => None,
        })
    }

    async fn reconcile_files(
        &self,
        descriptor: &TorrentDescriptor,
        files: &[DestinationFile],
    ) -> TorrentResult<Option<FailureReason>> {
        let id = &descriptor.id;
        if files.len() != descriptor.files.len() {
            warn!(
                source_files = descriptor.files.len(),
                destination_files = files.len(),
                "file layout differs; removing destination entry"
            );
            self.destination.delete(id, false).await?;
            return Ok(Some(FailureReason::LayoutMismatch {
                source_files: descriptor.files.len(),
                destination_files: files.len(),
            }));
        }

        let by_index: HashMap<u32, &DestinationFile> =
            files.iter().map(|file| (file.index, file)).collect();
        for wanted in &descriptor.files {
            let Some(current) = by_index.get(&wanted.index) else {
                warn!(index = wanted.index, path = %wanted.path, "destination has no file at this index");
                continue;
            };
            if current.name != wanted.path {
                debug!(index = wanted.index, from = %current.name, to = %wanted.path, "renaming file");
                tolerate(
                    self.destination
                        .rename_file(id, wanted.index, &wanted.path)
                        .await,
                    "file rename",
                    wanted.index,
                )?;
            }
            if current.priority != wanted.priority {
                tolerate(
                    self.destination
                        .set_file_priority(id, wanted.index, wanted.priority)
                        .await,
                    "priority update",
                    wanted.index,
                )?;
            }
        }

        if descriptor.files.len() == 1 {
            let handle = self
                .destination
                .torrent(id)
                .await?
                .ok_or_else(|| TorrentError::NotFound {
                    torrent_id: id.clone(),
                })?;
            if handle.name != descriptor.name {
                debug!(from = %handle.name, to = %descriptor.name, "renaming torrent");
                self.destination.rename_torrent(id, &descriptor.name).await?;
            }
        }
        debug!(stage = %MigrationStage::FilesReconciled, "files reconciled");
        Ok(None)
    }

    async fn finalize(&self, id: &TorrentId) -> TorrentResult<()> {
        if self.settings.auto_delete {
            self.source.remove_torrent(id, false).await?;
            info!("removed from source; data kept");
        }
        if self.settings.auto_resume {
            self.destination.resume(id).await?;
            info!("resumed at destination");
        }
        Ok(())
    }
}
