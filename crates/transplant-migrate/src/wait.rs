//! Bounded polling used by every timed suspension point of a migration.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Interval and upper bound for a polling wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between probes.
    pub interval: Duration,
    /// Total time allowed before giving up.
    pub timeout: Duration,
}

impl PollPolicy {
    /// Construct a policy.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Result of a bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    /// The probe produced a value before the deadline.
    Completed(T),
    /// The deadline passed first.
    TimedOut,
}

/// Probe until it yields `Some`, sleeping `policy.interval` between attempts.
///
/// The probe always runs at least once. A timeout is a value, not an error;
/// errors from the probe itself end the wait immediately.
///
/// # Errors
///
/// Returns the first error produced by `probe`.
pub async fn wait_until<T, E, F, Fut>(mut probe: F, policy: PollPolicy) -> Result<WaitOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        if let Some(value) = probe().await? {
            return Ok(WaitOutcome::Completed(value));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(WaitOutcome::TimedOut);
        }
        sleep(policy.interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FAST: PollPolicy = PollPolicy::new(Duration::from_millis(1), Duration::from_millis(200));

    #[tokio::test]
    async fn completes_once_probe_yields() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let outcome = wait_until(
            move || async move {
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>((seen >= 2).then_some(seen))
            },
            FAST,
        )
        .await;
        assert_eq!(outcome, Ok(WaitOutcome::Completed(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_without_error() {
        let policy = PollPolicy::new(Duration::from_millis(2), Duration::from_millis(10));
        let outcome = wait_until(|| async { Ok::<Option<()>, ()>(None) }, policy).await;
        assert_eq!(outcome, Ok(WaitOutcome::TimedOut));
    }

    #[tokio::test]
    async fn zero_timeout_still_probes_once() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let policy = PollPolicy::new(Duration::from_millis(5), Duration::ZERO);
        let outcome = wait_until(
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<Option<()>, ()>(None)
            },
            policy,
        )
        .await;
        assert!(matches!(outcome, Ok(WaitOutcome::TimedOut)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_errors_propagate() {
        let outcome = wait_until(|| async { Err::<Option<()>, _>("boom") }, FAST).await;
        assert_eq!(outcome, Err("boom"));
    }
}
