//! Resume correctness across interrupted runs.
//!
//! Run with:
//! ```bash
//! cargo test --package fusarex-extraction --test test_resume
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use fusarex_common::models::{Document, ExtractionResult};
use fusarex_extraction::scheduler::{BatchScheduler, CancelFlag, SchedulerConfig};
use fusarex_extraction::Extractor;
use fusarex_store::cache::ExtractionCache;
use fusarex_store::checkpoint::CheckpointStore;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn corpus(n: usize) -> Vec<Document> {
    (1..=n)
        .map(|i| Document::new(format!("PM_{i}"), format!("Paper {i}")))
        .collect()
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        group_size: 5,
        inter_group_delay: Duration::ZERO,
        checkpoint_every: 5,
    }
}

/// Succeeds on every call; counts them.
struct Counting {
    calls: AtomicUsize,
}

impl Counting {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Extractor for Counting {
    async fn extract(&self, document: &Document) -> anyhow::Result<ExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractionResult::empty(&document.id))
    }
}

/// Succeeds, but trips the cancel flag once `limit` documents are done,
/// simulating an operator interrupt mid-run.
struct CancelAfter {
    flag: CancelFlag,
    limit: usize,
    done: AtomicUsize,
}

#[async_trait]
impl Extractor for CancelAfter {
    async fn extract(&self, document: &Document) -> anyhow::Result<ExtractionResult> {
        if self.done.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.flag.cancel();
        }
        Ok(ExtractionResult::empty(&document.id))
    }
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_redoing_work() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cache = ExtractionCache::open(dir.path().join("extractions")).unwrap();
    let checkpoints = CheckpointStore::new(dir.path().join("checkpoint.json"));
    let documents = corpus(25);

    // First run stops after 10 documents.
    let scheduler = BatchScheduler::new(cache.clone(), checkpoints.clone(), config());
    let extractor = CancelAfter {
        flag: scheduler.cancel_flag(),
        limit: 10,
        done: AtomicUsize::new(0),
    };
    let first = scheduler.run(&documents, &extractor, None).await.unwrap();

    assert!(first.cancelled);
    assert_eq!(first.processed, 10);
    assert_eq!(checkpoints.load().unwrap().unwrap().results.len(), 10);

    // Second run picks up the remaining 15.
    let scheduler = BatchScheduler::new(cache.clone(), checkpoints.clone(), config());
    let extractor = Counting::new();
    let second = scheduler.run(&documents, &extractor, None).await.unwrap();

    assert!(!second.cancelled);
    assert_eq!(second.skipped_checkpoint, 10);
    assert_eq!(second.processed, 15);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 15);

    // Final checkpoint holds all 25, each id exactly once.
    let checkpoint = checkpoints.load().unwrap().unwrap();
    assert_eq!(checkpoint.results.len(), 25);
    let ids: HashSet<&str> = checkpoint.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), 25);
    assert_eq!(second.results.len(), 25);
}

#[tokio::test]
async fn test_resume_from_cache_when_checkpoint_is_lost() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cache = ExtractionCache::open(dir.path().join("extractions")).unwrap();
    let checkpoint_path = dir.path().join("checkpoint.json");
    let documents = corpus(25);

    let scheduler = BatchScheduler::new(
        cache.clone(),
        CheckpointStore::new(&checkpoint_path),
        config(),
    );
    let extractor = CancelAfter {
        flag: scheduler.cancel_flag(),
        limit: 10,
        done: AtomicUsize::new(0),
    };
    scheduler.run(&documents, &extractor, None).await.unwrap();

    // The checkpoint vanishes; the per-document cache survives.
    std::fs::remove_file(&checkpoint_path).unwrap();

    let scheduler = BatchScheduler::new(
        cache.clone(),
        CheckpointStore::new(&checkpoint_path),
        config(),
    );
    let extractor = Counting::new();
    let outcome = scheduler.run(&documents, &extractor, None).await.unwrap();

    assert_eq!(outcome.skipped_checkpoint, 0);
    assert_eq!(outcome.skipped_cache, 10);
    assert_eq!(outcome.processed, 15);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 15);

    // The rebuilt checkpoint again covers all 25 documents.
    let checkpoint = CheckpointStore::new(&checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.results.len(), 25);
}

#[tokio::test]
async fn test_cancel_before_first_document() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cache = ExtractionCache::open(dir.path().join("extractions")).unwrap();
    let checkpoints = CheckpointStore::new(dir.path().join("checkpoint.json"));

    let scheduler = BatchScheduler::new(cache, checkpoints.clone(), config());
    scheduler.cancel_flag().cancel();

    let documents = corpus(5);
    let extractor = Counting::new();
    let outcome = scheduler.run(&documents, &extractor, None).await.unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.processed, 0);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    // The final checkpoint is still written.
    assert!(checkpoints.load().unwrap().unwrap().results.is_empty());
}
