//! Error taxonomy for the ingestion pipeline
//!
//! Every failure surfaces to the sync orchestrator unchanged; nothing in the
//! core retries on its own.

use std::path::PathBuf;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad credentials or a failed code/refresh exchange. Requires re-consent.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// No callback or response arrived within the bound
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Transport failure or non-success status on listing/retrieval
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed MIME/base64 body
    #[error("Failed to decode message {id}: {reason}")]
    Decode { id: String, reason: String },

    /// Sync cursor file does not exist
    #[error("Sync cursor not found at {}", .0.display())]
    CacheMissing(PathBuf),

    /// Sync cursor file is unreadable or holds an invalid date
    #[error("Sync cursor is corrupt: {0}")]
    CacheCorrupt(String),

    /// Embedding endpoint returned a non-success status or malformed body
    #[error("Embedding service error (status {status:?}): {body}")]
    EmbeddingService { status: Option<u16>, body: String },

    /// Direct comparison of vectors with different lengths
    #[error("Vector dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Map a ureq transport error, keeping timeouts distinct
    pub(crate) fn from_transport(context: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(_) => Error::Timeout(format!("{}: {}", context, err)),
            other => Error::Network(format!("{}: {}", context, other)),
        }
    }
}
