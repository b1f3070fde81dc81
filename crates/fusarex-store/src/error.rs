//! Error types for the storage layer.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The checkpoint file exists but does not parse. Resuming against it
    /// would silently redo or lose work, so callers must treat this as
    /// fatal rather than start over.
    #[error("checkpoint {path} is malformed: {source}")]
    MalformedCheckpoint {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("checkpoint write to {path} failed: {source}")]
    CheckpointWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}
