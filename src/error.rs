//! Error taxonomy for the sync engine.
//!
//! Errors carry rendered messages rather than source errors so they can be
//! cloned into every subscriber's stream.

use thiserror::Error;

/// Failure talking to the remote rate feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Connection, DNS or TLS failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The feed answered with a non-success HTTP status.
    #[error("feed returned HTTP {0}")]
    Status(u16),

    /// The feed answered 200 but reported an error in the body.
    #[error("feed error {code}: {info}")]
    Api { code: i64, info: String },

    /// The payload could not be turned into a snapshot.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Failure reading or writing the local store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record exists for the requested currency.
    #[error("no rate stored for {0}")]
    NotFound(String),

    /// The storage substrate failed.
    #[error("storage failure: {0}")]
    Io(String),
}

impl StoreError {
    /// Classify a substrate failure, keeping the whole context chain.
    pub fn io(err: anyhow::Error) -> Self {
        StoreError::Io(format!("{err:#}"))
    }
}

/// Any failure surfaced by [`crate::sync::SyncCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Store(StoreError::NotFound(_)))
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type SyncResult<T> = Result<T, SyncError>;
