//! Checkpointed batch scheduler.
//!
//! Orchestrates the full flow for one extraction run:
//!   1. Load the checkpoint, if any; drop documents it already covers
//!   2. Fold cached results from earlier runs into the carried set
//!   3. Process the remainder in fixed-size groups, pacing between groups
//!   4. Isolate per-document failures; write each success through the cache
//!   5. Checkpoint every `checkpoint_every` documents and at run end
//!   6. Emit progress events via broadcast channel
//!
//! Retry is deliberately not layered here; wrap the extractor in
//! [`RetryingExtractor`](crate::extractor::RetryingExtractor) when the
//! provider call warrants it. Only checkpoint failures abort a run: losing
//! the durable record would make every later resume wrong.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use fusarex_common::config::BatchConfig;
use fusarex_common::models::{Document, ExtractionResult};
use fusarex_store::cache::ExtractionCache;
use fusarex_store::checkpoint::CheckpointStore;
use fusarex_store::StoreError;

use crate::extractor::Extractor;

// ── Config ────────────────────────────────────────────────────────────────────

/// Pacing and checkpoint knobs for one scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Documents processed per group. Minimum 1.
    pub group_size: usize,
    /// Sleep between consecutive groups.
    pub inter_group_delay: Duration,
    /// Checkpoint after this many processed documents. Minimum 1.
    pub checkpoint_every: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            group_size: 10,
            inter_group_delay: Duration::from_secs(60),
            checkpoint_every: 50,
        }
    }
}

impl From<&BatchConfig> for SchedulerConfig {
    fn from(cfg: &BatchConfig) -> Self {
        Self {
            group_size: cfg.group_size,
            inter_group_delay: Duration::from_secs(cfg.inter_group_delay_secs),
            checkpoint_every: cfg.checkpoint_every,
        }
    }
}

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Cloneable flag for cooperative cancellation.
///
/// Checked before each document and before each inter-group sleep. A
/// cancelled run still writes its final checkpoint, so nothing already
/// processed is lost.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Progress events ───────────────────────────────────────────────────────────

/// Progress event emitted during a run (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionProgress {
    pub run_id: Uuid,
    pub stage: String,
    pub message: String,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub remaining: usize,
    pub elapsed_secs: f64,
    pub error: Option<String>,
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    pub documents_total: usize,
    /// Documents skipped because the checkpoint already covered them.
    pub skipped_checkpoint: usize,
    /// Documents skipped because a cache entry from an earlier run existed.
    pub skipped_cache: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    /// Union of every result in the run lineage: carried checkpoint
    /// results, cache hits folded in at start, and this run's successes.
    /// Exactly what the final checkpoint holds.
    pub results: Vec<ExtractionResult>,
}

impl BatchOutcome {
    /// Fraction of processed documents that succeeded (1.0 when nothing ran).
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            1.0
        } else {
            self.succeeded as f64 / self.processed as f64
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Loading or persisting the checkpoint failed. Fatal: continuing
    /// without a durable record would make every later resume wrong.
    #[error("checkpoint failure: {0}")]
    Checkpoint(#[from] StoreError),
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

pub struct BatchScheduler {
    cache: ExtractionCache,
    checkpoints: CheckpointStore,
    config: SchedulerConfig,
    cancel: CancelFlag,
}

impl BatchScheduler {
    pub fn new(
        cache: ExtractionCache,
        checkpoints: CheckpointStore,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            cache,
            checkpoints,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle shared with callers that want to stop the run early.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Process `documents` through `extractor` under the configured pacing.
    ///
    /// Progress events are sent via `progress_tx` if provided. Per-document
    /// failures are contained: they are logged, counted, and the document
    /// stays eligible for the next run.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn run(
        &self,
        documents: &[Document],
        extractor: &dyn Extractor,
        progress_tx: Option<broadcast::Sender<ExtractionProgress>>,
    ) -> Result<BatchOutcome, SchedulerError> {
        let run_id = Uuid::new_v4();
        let t0 = Instant::now();
        let group_size = self.config.group_size.max(1);
        let checkpoint_every = self.config.checkpoint_every.max(1);

        // ── 1. Resume from the checkpoint ─────────────────────────────────────
        let mut results: Vec<ExtractionResult> = match self.checkpoints.load()? {
            Some(checkpoint) => {
                info!(
                    path = %self.checkpoints.path().display(),
                    carried = checkpoint.results.len(),
                    saved_at = %checkpoint.saved_at,
                    "Resuming from checkpoint"
                );
                checkpoint.results
            }
            None => Vec::new(),
        };
        let mut claimed: HashSet<String> = results.iter().map(|r| r.id.clone()).collect();
        let skipped_checkpoint = documents
            .iter()
            .filter(|doc| claimed.contains(&doc.id))
            .count();

        // ── 2. Fold cache hits from earlier runs into the carried set ─────────
        let mut skipped_cache = 0;
        let mut pending: Vec<&Document> = Vec::new();
        for doc in documents {
            if claimed.contains(&doc.id) {
                continue;
            }
            claimed.insert(doc.id.clone());
            match self.cache.get(&doc.id) {
                Ok(Some(result)) => {
                    results.push(result);
                    skipped_cache += 1;
                }
                Ok(None) => pending.push(doc),
                Err(e) => {
                    // An unreadable entry counts as uncached and is redone.
                    warn!(id = %doc.id, error = %e, "Cache entry unreadable, re-extracting");
                    pending.push(doc);
                }
            }
        }

        let total_pending = pending.len();
        info!(
            run_id = %run_id,
            total = documents.len(),
            skipped_checkpoint,
            skipped_cache,
            pending = total_pending,
            group_size,
            "Starting extraction run"
        );

        let mut outcome = BatchOutcome {
            run_id,
            documents_total: documents.len(),
            skipped_checkpoint,
            skipped_cache,
            processed: 0,
            succeeded: 0,
            failed: 0,
            cancelled: false,
            errors: Vec::new(),
            duration_ms: 0,
            results: Vec::new(),
        };

        let emit = |stage: &str, message: String, o: &BatchOutcome, error: Option<String>| {
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(ExtractionProgress {
                    run_id,
                    stage: stage.to_string(),
                    message,
                    processed: o.processed,
                    succeeded: o.succeeded,
                    failed: o.failed,
                    remaining: total_pending - o.processed,
                    elapsed_secs: t0.elapsed().as_secs_f64(),
                    error,
                });
            }
        };

        emit(
            "start",
            format!("{total_pending} documents to extract"),
            &outcome,
            None,
        );

        // ── 3. Process pending documents in groups ────────────────────────────
        'groups: for (group_index, group) in pending.chunks(group_size).enumerate() {
            if group_index > 0 {
                if self.cancel.is_cancelled() {
                    outcome.cancelled = true;
                    break 'groups;
                }
                debug!(
                    run_id = %run_id,
                    delay_secs = self.config.inter_group_delay.as_secs_f64(),
                    "Pacing before next group"
                );
                sleep(self.config.inter_group_delay).await;
            }

            for doc in group {
                if self.cancel.is_cancelled() {
                    outcome.cancelled = true;
                    break 'groups;
                }

                let extracted = extractor.extract(doc).await;
                outcome.processed += 1;
                match extracted {
                    Ok(mut result) => {
                        // The document id owns the record, whatever the
                        // extractor put there.
                        result.id = doc.id.clone();
                        if let Err(e) = self.cache.put(&result) {
                            // Non-fatal: the result still reaches the checkpoint.
                            warn!(id = %doc.id, error = %e, "Cache write failed");
                        }
                        results.push(result);
                        outcome.succeeded += 1;
                    }
                    Err(e) => {
                        let msg = format!("extraction failed for {}: {e:#}", doc.id);
                        warn!("{}", &msg);
                        outcome.failed += 1;
                        emit("document", format!("{} failed", doc.id), &outcome, Some(msg.clone()));
                        outcome.errors.push(msg);
                    }
                }

                if outcome.processed % checkpoint_every == 0 {
                    self.checkpoints.save(&results)?;
                    emit(
                        "checkpoint",
                        format!("checkpoint written after {} documents", outcome.processed),
                        &outcome,
                        None,
                    );
                }
            }

            info!(
                run_id = %run_id,
                group = group_index + 1,
                processed = outcome.processed,
                succeeded = outcome.succeeded,
                failed = outcome.failed,
                success_rate = outcome.success_rate(),
                elapsed_secs = t0.elapsed().as_secs_f64(),
                "Group complete"
            );
            emit(
                "group",
                format!("group {} complete", group_index + 1),
                &outcome,
                None,
            );
        }

        if outcome.cancelled {
            info!(run_id = %run_id, processed = outcome.processed, "Run cancelled");
        }

        // ── 4. Final checkpoint, unconditionally ──────────────────────────────
        self.checkpoints.save(&results)?;

        outcome.results = results;
        outcome.duration_ms = t0.elapsed().as_millis() as u64;

        info!(
            run_id = %run_id,
            processed = outcome.processed,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            success_rate = outcome.success_rate(),
            results = outcome.results.len(),
            duration_ms = outcome.duration_ms,
            "Extraction run complete"
        );
        emit(
            "complete",
            format!(
                "Done. {} extracted, {} failed, {} carried over.",
                outcome.succeeded,
                outcome.failed,
                outcome.skipped_checkpoint + outcome.skipped_cache
            ),
            &outcome,
            None,
        );

        Ok(outcome)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
