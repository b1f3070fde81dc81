//! fusarex-extraction: the resilient batch-extraction core.
//!
//! Pairs a generic exponential-backoff executor with a checkpointing batch
//! scheduler so that long, rate-limited extraction jobs survive process
//! crashes and provider hiccups without redoing completed work. The actual
//! extraction call is injected through the [`Extractor`] trait; this crate
//! ships no model backend of its own.
//!
//! See [`scheduler::BatchScheduler`] for the run lifecycle.

pub mod backoff;
pub mod extractor;
pub mod resolver;
pub mod scheduler;

// Re-export the types most callers need
pub use backoff::{Backoff, ExhaustedRetries, RetryPolicy};
pub use extractor::{Extractor, RetryingExtractor};
pub use resolver::uncached;
pub use scheduler::{
    BatchOutcome, BatchScheduler, CancelFlag, ExtractionProgress, SchedulerConfig, SchedulerError,
};
