//! Error types for the docscan-ocr library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`DocScanError`] — **Fatal**: the extraction cannot proceed at all
//!   (missing file, bad configuration, every batch failed, user cancelled).
//!   Returned as `Err(DocScanError)` from the top-level `extract*` functions.
//!
//! * [`BatchError`] — **Non-fatal**: one attempt of one batch failed. The
//!   executor retries it or, once the retry budget is spent, records the
//!   batch as permanently failed and moves on to the next batch.
//!
//! * [`RecognitionError`] — the contract of the remote recognition service
//!   (submit / poll / fetch). Every variant except `Cancelled` is a retryable
//!   attempt failure from the executor's point of view.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docscan-ocr library.
///
/// Batch-level failures use [`BatchError`] and are recorded in
/// [`crate::output::FailedBatch`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file kind has no extractor.
    #[error("Unsupported file type '{kind}' for '{path}'\n{hint}")]
    UnsupportedFileType {
        path: PathBuf,
        kind: String,
        hint: String,
    },

    /// The document was read but contained no usable text.
    #[error("No text could be extracted from '{path}': {reason}")]
    NoTextExtracted { path: PathBuf, reason: String },

    /// The document container is damaged or unreadable.
    #[error("Document '{path}' is corrupt: {detail}")]
    CorruptDocument { path: PathBuf, detail: String },

    // ── Planning / configuration errors ───────────────────────────────────
    /// Batch planning inputs are invalid; raised before any remote call.
    #[error("Invalid batch plan: {0}")]
    InvalidPlan(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A capability required for this document is not available at runtime.
    #[error("Capability '{capability}' is not available.\n{hint}")]
    CapabilityUnavailable { capability: String, hint: String },

    // ── Remote recognition errors ─────────────────────────────────────────
    /// The remote recognition client could not be constructed.
    #[error("Recognition client could not be initialised: {0}")]
    ClientInit(String),

    /// The whole-document recognition call failed.
    #[error("Recognition of '{path}' failed: {source}")]
    RecognitionFailed {
        path: PathBuf,
        #[source]
        source: RecognitionError,
    },

    /// Every planned batch failed permanently; there is nothing to aggregate.
    #[error("All {total} batches failed after {retries} attempts each.\nFirst error: {first_error}")]
    AllBatchesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    /// The user interrupted the job. Already-persisted batches remain on disk.
    #[error("Extraction cancelled after {completed} completed batches")]
    Cancelled { completed: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The incremental result store could not be written.
    #[error("Failed to write result store '{path}': {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the final output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed attempt of a single batch.
///
/// Never returned from the public API: the executor either retries the batch
/// or stores the rendered message in [`crate::output::FailedBatch`].
#[derive(Debug, Error)]
pub enum BatchError {
    /// None of the pages in the range could be copied into the sub-document.
    #[error("Batch {batch}: no pages could be copied from range {start}..{end}")]
    EmptyBatch {
        batch: usize,
        start: usize,
        end: usize,
    },

    /// The sub-document could not be produced at all.
    #[error("Batch {batch}: split failed: {detail}")]
    Split { batch: usize, detail: String },

    /// Submit, poll or fetch failed.
    #[error("Batch {batch}: {source}")]
    Recognition {
        batch: usize,
        #[source]
        source: RecognitionError,
    },
}

impl BatchError {
    /// True when the failure is a user interrupt rather than a batch fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            BatchError::Recognition {
                source: RecognitionError::Cancelled,
                ..
            }
        )
    }
}

/// Errors raised by a [`crate::recognition::RecognitionClient`] and the
/// polling loop around it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionError {
    /// The upload was rejected (network, auth or malformed input).
    #[error("submission failed: {0}")]
    Submission(String),

    /// A status query failed in transit; the polling loop keeps waiting.
    #[error("network error while polling: {0}")]
    TransientNetwork(String),

    /// The finished result could not be downloaded.
    #[error("download failed: {0}")]
    Download(String),

    /// The remote service reported the task as failed.
    #[error("remote task failed: {0}")]
    TaskFailed(String),

    /// Polling exceeded the configured maximum wait.
    #[error("task did not finish within {secs}s")]
    TaskTimeout { secs: u64 },

    /// The user interrupted while a remote call was in flight.
    #[error("cancelled")]
    Cancelled,
}

impl RecognitionError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RecognitionError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_batches_failed_display() {
        let e = DocScanError::AllBatchesFailed {
            total: 6,
            retries: 3,
            first_error: "remote task failed: bad scan".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 6 batches"), "got: {msg}");
        assert!(msg.contains("bad scan"), "got: {msg}");
    }

    #[test]
    fn empty_batch_display() {
        let e = BatchError::EmptyBatch {
            batch: 2,
            start: 40,
            end: 60,
        };
        assert!(e.to_string().contains("40..60"));
    }

    #[test]
    fn timeout_display() {
        let e = RecognitionError::TaskTimeout { secs: 300 };
        assert_eq!(e.to_string(), "task did not finish within 300s");
    }

    #[test]
    fn cancellation_is_detected_through_batch_error() {
        let cancelled = BatchError::Recognition {
            batch: 0,
            source: RecognitionError::Cancelled,
        };
        assert!(cancelled.is_cancellation());

        let failed = BatchError::Recognition {
            batch: 0,
            source: RecognitionError::TaskFailed("x".into()),
        };
        assert!(!failed.is_cancellation());
        assert!(!BatchError::Split {
            batch: 1,
            detail: "io".into()
        }
        .is_cancellation());
    }

    #[test]
    fn recognition_failed_keeps_source() {
        use std::error::Error as _;
        let e = DocScanError::RecognitionFailed {
            path: PathBuf::from("scan.pdf"),
            source: RecognitionError::Download("HTTP 404".into()),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("HTTP 404"));
    }
}
