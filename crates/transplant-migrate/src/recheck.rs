//! Waiting for a destination integrity check to finish.

use tokio::time::sleep;
use tracing::debug;
use transplant_torrent_core::{
    DestinationClient, DestinationTorrent, TorrentError, TorrentId, TorrentResult,
};

use crate::wait::{PollPolicy, WaitOutcome, wait_until};

/// How a recheck wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RecheckOutcome {
    /// The torrent left every checking state; carries the refreshed handle.
    Completed(DestinationTorrent),
    /// The torrent was still checking when the timeout elapsed.
    TimedOut,
    /// The torrent disappeared from the destination while polling.
    NotFound,
}

enum Probe {
    Settled(DestinationTorrent),
    Gone,
}

/// Poll the destination until `id` stops checking.
///
/// The first probe is delayed by one interval so the destination has a chance
/// to enter a checking state after the recheck command.
///
/// # Errors
///
/// Returns client errors raised while polling.
pub async fn wait_for_recheck(
    destination: &dyn DestinationClient,
    id: &TorrentId,
    policy: PollPolicy,
) -> TorrentResult<RecheckOutcome> {
    sleep(policy.interval.min(policy.timeout)).await;
    let remaining = PollPolicy::new(
        policy.interval,
        policy.timeout.saturating_sub(policy.interval),
    );

    let outcome = wait_until(
        move || async move {
            let probe = match destination.torrent(id).await? {
                None => Some(Probe::Gone),
                Some(handle) if handle.state.is_checking() => {
                    debug!(torrent_id = %id, progress = %handle.progress, "recheck in progress");
                    None
                }
                Some(handle) => Some(Probe::Settled(handle)),
            };
            Ok::<_, TorrentError>(probe)
        },
        remaining,
    )
    .await?;

    Ok(match outcome {
        WaitOutcome::Completed(Probe::Settled(handle)) => RecheckOutcome::Completed(handle),
        WaitOutcome::Completed(Probe::Gone) => RecheckOutcome::NotFound,
        WaitOutcome::TimedOut => RecheckOutcome::TimedOut,
    })
}
