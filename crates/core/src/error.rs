//! Unified error types for the offline cache manager.
//!
//! Every variant renders with a stable upper-case code prefix so log
//! consumers can match on it without parsing the message.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the worker, the cache engine and the host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a manifest path that does not resolve).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored entry could not be decoded back into a response.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// No cache store exists under the given name.
    #[error("STORE_NOT_FOUND: {0}")]
    StoreNotFound(String),

    /// Store lifecycle transitions only move forward.
    #[error("INVALID_TRANSITION: store {name}: {from} -> {to}")]
    InvalidTransition { name: String, from: String, to: String },

    /// Only read requests may be written to a store.
    #[error("UNCACHEABLE_REQUEST: {0}")]
    UncacheableRequest(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network fetch failed and no fallback applied.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Populating the manifest failed; the version never becomes ready.
    #[error("SETUP_FAILED: {path}: {reason}")]
    SetupFailed { path: String, reason: String },
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
