//! Per-torrent migration results.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use thiserror::Error;
use transplant_torrent_core::{Progress, TorrentError};

/// Step of the per-torrent state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStage {
    /// Descriptor pulled from the source inventory.
    Discovered,
    /// Source copy paused.
    PausedAtSource,
    /// Definition submitted to the destination.
    Transferred,
    /// Destination reports a non-empty file list.
    MetadataResolved,
    /// File names and priorities aligned with the source.
    FilesReconciled,
    /// Integrity check running at the destination.
    Rechecking,
    /// Completion compared between both sides.
    Verified,
    /// Source removal and destination resume applied.
    Finalized,
}

impl MigrationStage {
    /// Stable snake-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::PausedAtSource => "paused_at_source",
            Self::Transferred => "transferred",
            Self::MetadataResolved => "metadata_resolved",
            Self::FilesReconciled => "files_reconciled",
            Self::Rechecking => "rechecking",
            Self::Verified => "verified",
            Self::Finalized => "finalized",
        }
    }
}

impl Display for MigrationStage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Why a torrent was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The destination already holds a torrent with this hash.
    AlreadyAtDestination,
}

impl Display for SkipReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyAtDestination => formatter.write_str("already present at destination"),
        }
    }
}

/// Why a single torrent's migration stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The destination refused the add request.
    #[error("destination rejected the torrent: {detail}")]
    AddRejected {
        /// Destination response explaining the refusal.
        detail: String,
    },
    /// Metadata never resolved; the partial destination entry is left in place.
    #[error("metadata did not resolve within {waited:?}")]
    MetadataTimeout {
        /// How long the wait lasted.
        waited: Duration,
    },
    /// File counts differ; the destination entry was removed.
    #[error("layout mismatch: source has {source_files} files, destination resolved {destination_files}")]
    LayoutMismatch {
        /// Files listed by the source.
        source_files: usize,
        /// Files resolved by the destination.
        destination_files: usize,
    },
    /// The destination lost the torrent.
    #[error("torrent missing at destination during {stage}")]
    NotFound {
        /// Step at which the torrent went missing.
        stage: MigrationStage,
    },
    /// The destination session lapsed mid-torrent.
    #[error("destination session expired during {stage}")]
    SessionExpired {
        /// Step at which the session lapsed.
        stage: MigrationStage,
    },
    /// A client command failed.
    #[error("{stage} failed: {message}")]
    Client {
        /// Step whose command failed.
        stage: MigrationStage,
        /// Rendered client error chain.
        message: String,
    },
}

impl FailureReason {
    /// Classify a non-fatal client error raised at `stage`.
    #[must_use]
    pub fn from_error(stage: MigrationStage, error: &TorrentError) -> Self {
        match error {
            TorrentError::NotFound { .. } => Self::NotFound { stage },
            TorrentError::SessionExpired { .. } => Self::SessionExpired { stage },
            other => Self::Client {
                stage,
                message: render_chain(other),
            },
        }
    }
}

fn render_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut cause = error.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}

/// Terminal result of migrating one torrent.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// Nothing was done.
    Skipped(SkipReason),
    /// Completion matched and finalisation ran.
    Finalized {
        /// Completion the destination reported after the recheck.
        destination_progress: Progress,
    },
    /// Completion differs; both sides were left for manual review.
    Mismatch {
        /// Difference in percentage points.
        diff: f64,
    },
    /// The migration of this torrent stopped early.
    Failed(FailureReason),
}

impl MigrationOutcome {
    /// Short label used in summaries.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "skipped",
            Self::Finalized { .. } => "finalized",
            Self::Mismatch { .. } => "mismatch",
            Self::Failed(_) => "failed",
        }
    }
}

impl Display for MigrationOutcome {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(reason) => write!(formatter, "skipped ({reason})"),
            Self::Finalized {
                destination_progress,
            } => write!(formatter, "finalized at {destination_progress}"),
            Self::Mismatch { diff } => write!(formatter, "progress mismatch of {diff:.2} points"),
            Self::Failed(reason) => write!(formatter, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transplant_torrent_core::TorrentId;

    #[test]
    fn client_errors_are_classified() {
        let missing = TorrentError::NotFound {
            torrent_id: TorrentId::new("aa"),
        };
        assert_eq!(
            FailureReason::from_error(MigrationStage::Rechecking, &missing),
            FailureReason::NotFound {
                stage: MigrationStage::Rechecking
            }
        );

        let expired = TorrentError::SessionExpired { operation: "files" };
        assert_eq!(
            FailureReason::from_error(MigrationStage::MetadataResolved, &expired),
            FailureReason::SessionExpired {
                stage: MigrationStage::MetadataResolved
            }
        );
    }

    #[test]
    fn client_failure_renders_source_chain() {
        let io = std::io::Error::other("disk gone");
        let error = TorrentError::operation("read_metainfo", None, io);
        let reason = FailureReason::from_error(MigrationStage::Transferred, &error);
        assert_eq!(
            reason.to_string(),
            "transferred failed: read_metainfo failed: disk gone"
        );
    }

    #[test]
    fn outcome_display_is_readable() {
        assert_eq!(
            MigrationOutcome::Mismatch { diff: 12.5 }.to_string(),
            "progress mismatch of 12.50 points"
        );
        assert_eq!(
            MigrationOutcome::Skipped(SkipReason::AlreadyAtDestination).to_string(),
            "skipped (already present at destination)"
        );
    }
}
