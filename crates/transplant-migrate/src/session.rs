//! Proactive re-authentication against the destination.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};
use transplant_torrent_core::{Credentials, DestinationClient, TorrentResult};

/// Share of the destination's session timeout after which a new login is forced.
pub const REFRESH_RATIO: f64 = 0.75;

/// Whether [`SessionFreshnessGuard::ensure_fresh`] had to log in again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The existing session was kept.
    Current,
    /// A new login was performed.
    Refreshed,
}

/// Tracks the age of the destination session for one run.
pub struct SessionFreshnessGuard {
    credentials: Credentials,
    session_timeout: Duration,
    last_login: Option<Instant>,
}

impl SessionFreshnessGuard {
    /// Guard that has not logged in yet; the first check always authenticates.
    #[must_use]
    pub const fn new(credentials: Credentials, session_timeout: Duration) -> Self {
        Self {
            credentials,
            session_timeout,
            last_login: None,
        }
    }

    /// Log in and read the destination's session timeout.
    ///
    /// # Errors
    ///
    /// Propagates login or preference lookup failures.
    pub async fn establish(
        destination: &dyn DestinationClient,
        credentials: Credentials,
    ) -> TorrentResult<Self> {
        destination.login(&credentials).await?;
        let session_timeout = destination.session_timeout().await?;
        debug!(timeout_secs = session_timeout.as_secs(), "destination session established");
        Ok(Self {
            credentials,
            session_timeout,
            last_login: Some(Instant::now()),
        })
    }

    /// Session timeout the guard works against.
    #[must_use]
    pub const fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Re-authenticate when the session is rejected or close to expiry.
    ///
    /// # Errors
    ///
    /// Login failures propagate and are expected to end the run.
    pub async fn ensure_fresh(
        &mut self,
        destination: &dyn DestinationClient,
    ) -> TorrentResult<Freshness> {
        let aged = self
            .last_login
            .is_none_or(|at| at.elapsed() > self.session_timeout.mul_f64(REFRESH_RATIO));
        if !aged && destination.is_authenticated().await? {
            return Ok(Freshness::Current);
        }

        destination.login(&self.credentials).await?;
        self.last_login = Some(Instant::now());
        info!(aged, "destination session refreshed");
        Ok(Freshness::Refreshed)
    }

    /// Force the next [`Self::ensure_fresh`] to log in again.
    pub const fn mark_stale(&mut self) {
        self.last_login = None;
    }
}
