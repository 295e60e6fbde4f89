//! Progress-callback trait for per-batch OCR events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to receive events
//! as the executor resolves each batch. The CLI uses it to drive a progress
//! bar; a service could forward the same events to a job table.
//!
//! # Example
//!
//! ```rust
//! use docscan_ocr::{BatchProgressCallback, OcrConfig, PageRange};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_batch_complete(&self, index: usize, range: PageRange, total: usize, chars: usize, elapsed_ms: u64) {
//!         let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("batch {}/{} ({range}) {chars} chars in {elapsed_ms}ms [{done} done]", index + 1, total);
//!     }
//! }
//!
//! let config = OcrConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::PageRange;
use std::sync::Arc;

/// Called by the batch executor as it works through the plan.
///
/// Batches run strictly one after another, so events for different batches
/// never interleave. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after planning, before the first batch is split.
    fn on_job_start(&self, total_batches: usize, total_pages: usize) {
        let _ = (total_batches, total_pages);
    }

    /// Called when a batch moves to Running (first attempt only).
    fn on_batch_start(&self, index: usize, range: PageRange, total_batches: usize) {
        let _ = (index, range, total_batches);
    }

    /// Called after a failed attempt that will be retried.
    ///
    /// * `attempt` — 1-indexed number of the attempt that just failed
    fn on_batch_retry(&self, index: usize, attempt: u32, error: &str) {
        let _ = (index, attempt, error);
    }

    /// Called when a batch succeeds and its result is durably persisted.
    fn on_batch_complete(
        &self,
        index: usize,
        range: PageRange,
        total_batches: usize,
        chars: usize,
        elapsed_ms: u64,
    ) {
        let _ = (index, range, total_batches, chars, elapsed_ms);
    }

    /// Called when a batch exhausts its attempts.
    fn on_batch_failed(&self, index: usize, range: PageRange, total_batches: usize, error: &str) {
        let _ = (index, range, total_batches, error);
    }

    /// Called once after every batch reached a terminal state.
    fn on_job_complete(&self, total_batches: usize, succeeded: usize) {
        let _ = (total_batches, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        retries: AtomicUsize,
        completes: AtomicUsize,
        failures: AtomicUsize,
        succeeded_total: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, _index: usize, _range: PageRange, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_retry(&self, _index: usize, _attempt: u32, _error: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _i: usize, _r: PageRange, _t: usize, _c: usize, _e: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_failed(&self, _i: usize, _r: PageRange, _t: usize, _e: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_complete(&self, _total: usize, succeeded: usize) {
            self.succeeded_total.store(succeeded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start(3, 60);
        cb.on_batch_start(0, PageRange::new(0, 20), 3);
        cb.on_batch_retry(0, 1, "timeout");
        cb.on_batch_complete(0, PageRange::new(0, 20), 3, 100, 12);
        cb.on_batch_failed(1, PageRange::new(20, 40), 3, "boom");
        cb.on_job_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(0, PageRange::new(0, 20), 2);
        tracker.on_batch_retry(0, 1, "x");
        tracker.on_batch_complete(0, PageRange::new(0, 20), 2, 10, 5);
        tracker.on_batch_start(1, PageRange::new(20, 30), 2);
        tracker.on_batch_failed(1, PageRange::new(20, 30), 2, "y");
        tracker.on_job_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.retries.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded_total.load(Ordering::SeqCst), 1);
    }
}
