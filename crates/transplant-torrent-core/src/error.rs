//! Error types for source and destination client operations.

use std::error::Error;

use thiserror::Error;

use crate::model::TorrentId;

/// Primary error type for torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// The daemon could not be reached or the transport failed.
    #[error("connection failure during {operation}")]
    Connectivity {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying transport failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The daemon rejected the supplied credentials.
    #[error("authentication rejected during {operation}")]
    AuthRejected {
        /// Operation identifier.
        operation: &'static str,
    },
    /// The authenticated session is no longer valid.
    #[error("session expired during {operation}")]
    SessionExpired {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Torrent was not found.
    #[error("torrent {torrent_id} not found")]
    NotFound {
        /// Missing torrent identifier.
        torrent_id: TorrentId,
    },
    /// Operation is not supported by the client.
    #[error("operation {operation} not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Operation failed in the daemon.
    #[error("{operation} failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Torrent identifier when available.
        torrent_id: Option<TorrentId>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The daemon answered with a payload that could not be interpreted.
    #[error("invalid response to {operation}: {detail}")]
    InvalidResponse {
        /// Operation identifier.
        operation: &'static str,
        /// Description of what was wrong with the payload.
        detail: String,
    },
}

impl TorrentError {
    /// Wrap a transport failure.
    pub fn connectivity(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Connectivity {
            operation,
            source: source.into(),
        }
    }

    /// Wrap a daemon-side failure for a torrent operation.
    pub fn operation(
        operation: &'static str,
        torrent_id: Option<&TorrentId>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::OperationFailed {
            operation,
            torrent_id: torrent_id.cloned(),
            source: source.into(),
        }
    }

    /// Build an invalid-response error.
    pub fn invalid_response(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            detail: detail.into(),
        }
    }

    /// Whether the failure must abort the whole run rather than a single torrent.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::AuthRejected { .. })
    }

    /// Whether the failure indicates the authenticated session lapsed.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }
}

/// Convenience alias for torrent client results.
pub type TorrentResult<T> = Result<T, TorrentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_and_auth_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(TorrentError::connectivity("login", io).is_fatal());
        assert!(TorrentError::AuthRejected { operation: "login" }.is_fatal());
    }

    #[test]
    fn per_torrent_failures_are_not_fatal() {
        let id = TorrentId::new("ABC");
        assert!(!TorrentError::NotFound { torrent_id: id }.is_fatal());
        assert!(!TorrentError::SessionExpired { operation: "recheck" }.is_fatal());
        assert!(TorrentError::SessionExpired { operation: "recheck" }.is_session_expired());
        assert!(!TorrentError::invalid_response("files", "not a list").is_fatal());
    }

    #[test]
    fn not_found_message_names_torrent() {
        let err = TorrentError::NotFound {
            torrent_id: TorrentId::new("DEADBEEF"),
        };
        assert_eq!(err.to_string(), "torrent deadbeef not found");
    }
}
