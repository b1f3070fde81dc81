//! fusarex-store: durable storage for extraction runs.
//!
//! Two artifacts with different lifetimes live here:
//! - the content cache: one JSON file per document id, written once per
//!   successful extraction and kept until explicitly cleared
//! - the run checkpoint: a single JSON file, atomically replaced, holding
//!   the union of every result accumulated so far in a run lineage

pub mod cache;
pub mod checkpoint;
pub mod error;

pub use cache::{safe_key, CacheEntry, CacheStats, ClearOutcome, ExtractionCache};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use error::{Result, StoreError};
