//! Durable run checkpoints.
//!
//! A checkpoint is one JSON file holding every result accumulated so far in
//! a run lineage. It is rewritten wholesale: serialized to a temp file in
//! the same directory, then renamed over the previous file, so a crash
//! mid-write can never leave a truncated checkpoint behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use fusarex_common::models::ExtractionResult;

use crate::error::{Result, StoreError};

/// On-disk checkpoint envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub saved_at: DateTime<Utc>,
    pub results: Vec<ExtractionResult>,
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    saved_at: DateTime<Utc>,
    results: &'a [ExtractionResult],
}

/// Store managing the checkpoint file for one run lineage.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint, if one exists.
    ///
    /// A missing file is a clean start (`None`). A file that exists but
    /// does not parse is an error; see `StoreError::MalformedCheckpoint`.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checkpoint =
            serde_json::from_str(&body).map_err(|source| StoreError::MalformedCheckpoint {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(checkpoint))
    }

    /// Persist the full result union, replacing any prior checkpoint.
    pub fn save(&self, results: &[ExtractionResult]) -> Result<()> {
        let body = serde_json::to_vec_pretty(&CheckpointRef {
            saved_at: Utc::now(),
            results,
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| self.write_error(source))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| self.write_error(source))?;
        tmp.write_all(&body).map_err(|source| self.write_error(source))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        debug!(path = %self.path.display(), results = results.len(), "Checkpoint written");
        Ok(())
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::CheckpointWrite {
            path: self.path.clone(),
            source,
        }
    }
}
