//! The injected extraction seam.
//!
//! [`Extractor`] is the interface the batch scheduler drives. An
//! implementation owns prompt construction, the provider call, and response
//! parsing; the core never sees any of that. [`RetryingExtractor`] composes
//! the backoff executor around any inner implementation, which is how
//! transient provider failures get absorbed before the scheduler ever
//! counts a document as failed.

use async_trait::async_trait;

use fusarex_common::models::{Document, ExtractionResult};

use crate::backoff::{Backoff, RetryPolicy};

/// One document in, one structured record out.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, document: &Document) -> anyhow::Result<ExtractionResult>;
}

/// Decorator adding bounded exponential-backoff retry to any extractor.
pub struct RetryingExtractor<E> {
    inner: E,
    backoff: Backoff,
}

impl<E: Extractor> RetryingExtractor<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self {
            inner,
            backoff: Backoff::new(policy),
        }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait]
impl<E: Extractor> Extractor for RetryingExtractor<E> {
    async fn extract(&self, document: &Document) -> anyhow::Result<ExtractionResult> {
        let result = self.backoff.run(|| self.inner.extract(document)).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails `failures` times, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Extractor for Flaky {
        async fn extract(&self, document: &Document) -> anyhow::Result<ExtractionResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                anyhow::bail!("429 rate limit (call {call})");
            }
            Ok(ExtractionResult::empty(&document.id))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(10), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let extractor = RetryingExtractor::new(
            Flaky {
                failures: 2,
                calls: AtomicU32::new(0),
            },
            fast_policy(5),
        );

        let doc = Document::new("PM_1", "Title");
        let result = extractor.extract(&doc).await.unwrap();
        assert_eq!(result.id, "PM_1");
        assert_eq!(extractor.into_inner().calls.into_inner(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_surfaces_attempt_count() {
        let extractor = RetryingExtractor::new(
            Flaky {
                failures: u32::MAX,
                calls: AtomicU32::new(0),
            },
            fast_policy(3),
        );

        let doc = Document::new("PM_1", "Title");
        let err = extractor.extract(&doc).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("after 3 attempts"), "got: {text}");
        assert!(text.contains("rate limit"), "got: {text}");
    }
}
