//! On-disk content cache of extraction results.
//!
//! One JSON file per document id under the cache directory, named
//! `<safe_key(id)>.json`. Writes are idempotent (last writer wins) and
//! entries never expire; only an explicit, confirmed `clear` removes them.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use fusarex_common::models::ExtractionResult;

use crate::error::Result;

const ENTRY_EXT: &str = "json";

/// Map a document id to a filesystem-safe cache key.
///
/// Every character outside `[A-Za-z0-9_-]` becomes `_`. The mapping is pure
/// and idempotent. Distinct ids can collide after mapping ("a/b" and "a_b");
/// callers own id uniqueness under this transform.
pub fn safe_key(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Receipt for one durable cache write.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub safe_key: String,
    pub path: PathBuf,
    pub bytes_written: u64,
    pub written_at: DateTime<Utc>,
}

/// Outcome of a `clear` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// All entries deleted; carries the number removed.
    Cleared(usize),
    /// No affirmative confirmation was given; nothing was touched.
    Refused,
}

/// Read-only view of the cache directory state.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub exists: bool,
    pub entries: usize,
    pub total_size_bytes: u64,
}

/// Handle to a cache directory.
#[derive(Debug, Clone)]
pub struct ExtractionCache {
    dir: PathBuf,
}

impl ExtractionCache {
    /// Open a cache directory, creating it if missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", safe_key(id), ENTRY_EXT))
    }

    /// Write one result durably, keyed by its owning id. Re-writing the
    /// same id replaces the prior entry.
    pub fn put(&self, result: &ExtractionResult) -> Result<CacheEntry> {
        let path = self.entry_path(&result.id);
        let body = serde_json::to_vec_pretty(result)?;
        fs::write(&path, &body)?;
        debug!(id = %result.id, path = %path.display(), "Cache entry written");
        Ok(CacheEntry {
            safe_key: safe_key(&result.id),
            path,
            bytes_written: body.len() as u64,
            written_at: Utc::now(),
        })
    }

    /// True if an entry exists for this id.
    pub fn contains(&self, id: &str) -> bool {
        self.entry_path(id).is_file()
    }

    /// Read one entry back, if present.
    pub fn get(&self, id: &str) -> Result<Option<ExtractionResult>> {
        let path = self.entry_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        let body = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Read every entry in the cache directory.
    ///
    /// Entries that fail to read or parse are skipped with a warning; one
    /// bad file never aborts the bulk read.
    pub fn get_all(&self) -> Result<Vec<ExtractionResult>> {
        let mut results = Vec::new();
        for path in self.entry_paths()? {
            let body = match fs::read_to_string(&path) {
                Ok(body) => body,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                    continue;
                }
            };
            match serde_json::from_str(&body) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed cache entry");
                }
            }
        }
        Ok(results)
    }

    /// Safe keys of every entry currently present.
    pub fn cached_keys(&self) -> Result<HashSet<String>> {
        let mut keys = HashSet::new();
        for path in self.entry_paths()? {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.insert(stem.to_string());
            }
        }
        Ok(keys)
    }

    /// Delete every entry. Requires `confirm == true`; refuses otherwise.
    pub fn clear(&self, confirm: bool) -> Result<ClearOutcome> {
        if !confirm {
            warn!(dir = %self.dir.display(), "Cache clear requested without confirmation, refusing");
            return Ok(ClearOutcome::Refused);
        }
        let mut removed = 0;
        for path in self.entry_paths()? {
            fs::remove_file(&path)?;
            removed += 1;
        }
        info!(dir = %self.dir.display(), removed, "Cache cleared");
        Ok(ClearOutcome::Cleared(removed))
    }

    /// Entry count and total size on disk.
    pub fn stats(&self) -> Result<CacheStats> {
        if !self.dir.is_dir() {
            return Ok(CacheStats::default());
        }
        let mut entries = 0;
        let mut total_size_bytes = 0;
        for path in self.entry_paths()? {
            entries += 1;
            total_size_bytes += fs::metadata(&path)?.len();
        }
        Ok(CacheStats {
            exists: true,
            entries,
            total_size_bytes,
        })
    }

    /// Paths of all `.json` entries, sorted for stable iteration.
    fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        if !self.dir.is_dir() {
            return Ok(paths);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXT) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}
