//! Completion comparison between the source and destination copies.

use transplant_torrent_core::Progress;

/// Largest difference, in percentage points, still treated as a match (exclusive).
pub const PROGRESS_TOLERANCE: f64 = 1.0;

/// Verdict reached after comparing both sides' completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressVerdict {
    /// The destination agrees with the source within tolerance.
    Verified,
    /// The destination disagrees; the difference is in percentage points.
    Mismatch {
        /// Absolute difference in percentage points.
        diff: f64,
    },
}

/// Compare completion on the canonical percentage scale.
#[must_use]
pub fn reconcile(source: Progress, destination: Progress) -> ProgressVerdict {
    let diff = source.distance(destination);
    if diff < PROGRESS_TOLERANCE {
        ProgressVerdict::Verified
    } else {
        ProgressVerdict::Mismatch { diff }
    }
}
