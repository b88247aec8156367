//! Error types for the Nginx Proxy Manager client

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`crate::ProxyManagerClient`]
#[derive(Debug, Error)]
pub enum Error {
    /// Credential exchange against `/api/tokens` failed.
    /// Fatal during client construction.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The API answered with a non-success status.
    #[error("API request failed (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure: connect, IO, or body decode.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Payload serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request failed client-side validation and was never sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A proxy host was created or renamed but the follow-up update that
    /// re-applies the SSL flags failed. The host exists under `host_id`
    /// with unreconciled flags; retry the flag update via
    /// `ProxyManagerClient::update_proxy_host`.
    #[error("proxy host {host_id} exists but the SSL flag update failed: {source}")]
    PartialReconciliation {
        host_id: u64,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Id of the host left behind by a partially reconciled create/rename.
    pub fn partial_host_id(&self) -> Option<u64> {
        match self {
            Error::PartialReconciliation { host_id, .. } => Some(*host_id),
            _ => None,
        }
    }
}
