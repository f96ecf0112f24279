//! Deluge Web UI JSON-RPC envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error code the Web UI returns when the session cookie is missing or stale.
pub(crate) const NOT_AUTHENTICATED: i64 = 1;

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub(crate) method: &'a str,
    pub(crate) params: Value,
    pub(crate) id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub(crate) result: Value,
    #[serde(default)]
    pub(crate) error: Option<RpcFault>,
}

/// Error object carried in a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Error)]
#[error("deluge error {code}: {message}")]
pub(crate) struct RpcFault {
    #[serde(default)]
    pub(crate) code: i64,
    #[serde(default)]
    pub(crate) message: String,
}

impl RpcFault {
    pub(crate) const fn is_not_authenticated(&self) -> bool {
        self.code == NOT_AUTHENTICATED
    }
}

/// Daemon known to the Web UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HostEntry {
    pub(crate) id: String,
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl HostEntry {
    pub(crate) fn matches(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }
}

/// Parse `web.get_hosts`, whose entries are `[id, host, port, status?]` arrays.
pub(crate) fn parse_hosts(value: &Value) -> Option<Vec<HostEntry>> {
    value
        .as_array()?
        .iter()
        .map(|entry| {
            let fields = entry.as_array()?;
            Some(HostEntry {
                id: fields.first()?.as_str()?.to_string(),
                host: fields.get(1)?.as_str()?.to_string(),
                port: u16::try_from(fields.get(2)?.as_u64()?).ok()?,
            })
        })
        .collect()
}
