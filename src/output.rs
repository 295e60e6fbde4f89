//! Data model shared by the pipeline stages and returned to callers.
//!
//! Everything here is `Serialize` so the CLI can emit a full run report with
//! `--json`, and so a [`JobOutcome`] can be logged or archived next to the
//! result store it describes.

use crate::error::DocScanError;
use crate::pipeline::sniff::FileKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A source document whose page count and size are known before planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    pub page_count: usize,
    pub size_bytes: u64,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, page_count: usize, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            page_count,
            size_bytes,
        }
    }

    /// File name including extension, used in provenance tags and headers.
    pub fn name(&self) -> String {
        file_name(&self.path)
    }

    /// File name without extension; the job identity of the result store.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Half-open, 0-indexed page range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders as the human, 1-indexed inclusive form: `pages 21-40`.
impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pages {}-{}", self.start + 1, self.end)
    }
}

/// Lifecycle of a batch: `Pending → Running → {Succeeded | FailedPermanently}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BatchStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    FailedPermanently,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Succeeded | BatchStatus::FailedPermanently)
    }
}

/// One planned unit of remote work.
///
/// Created by the planner, mutated only by the executor, never removed:
/// failed batches stay in [`JobOutcome::batches`] with their final status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub range: PageRange,
    pub status: BatchStatus,
    /// Attempts made so far (each attempt is submit → poll → fetch).
    pub attempts: u32,
}

impl Batch {
    pub fn new(index: usize, range: PageRange) -> Self {
        Self {
            index,
            range,
            status: BatchStatus::Pending,
            attempts: 0,
        }
    }

    /// Move to `to`, rejecting edges outside the batch lifecycle.
    ///
    /// `Running → Running` is allowed: a retried batch stays Running.
    pub fn transition(&mut self, to: BatchStatus) -> Result<(), DocScanError> {
        use BatchStatus::*;
        let allowed = matches!(
            (self.status, to),
            (Pending, Running) | (Running, Running) | (Running, Succeeded) | (Running, FailedPermanently)
        );
        if !allowed {
            return Err(DocScanError::Internal(format!(
                "batch {} cannot move from {:?} to {:?}",
                self.index, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }

    /// Provenance marker written before the batch text: `[Batch 1: pages 1-20]`.
    pub fn marker(&self) -> String {
        format!("[Batch {}: {}]", self.index + 1, self.range)
    }
}

/// Text recognised for one successful batch. Produced exactly once per batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub index: usize,
    pub range: PageRange,
    pub text: String,
    pub completed_at: DateTime<Utc>,
}

/// A batch that spent its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub index: usize,
    pub range: PageRange,
    pub attempts: u32,
    /// Rendered message of the last attempt's error.
    pub error: String,
}

/// Terminal result of a batched OCR job.
///
/// `succeeded.len() + failed.len()` always equals the planned batch count.
/// Partial success is a normal outcome; check [`JobOutcome::is_partial`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub source_name: String,
    pub total_pages: usize,
    pub batch_size: usize,
    /// Every planned batch with its final status, in index order.
    pub batches: Vec<Batch>,
    /// Successful batches in ascending index order.
    pub succeeded: Vec<BatchResult>,
    /// Permanently failed batches in ascending index order.
    pub failed: Vec<FailedBatch>,
    /// Aggregated text with provenance markers.
    pub text: String,
    /// The incremental result store backing `text`.
    pub store_path: PathBuf,
}

impl JobOutcome {
    pub fn planned_count(&self) -> usize {
        self.batches.len()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.index).collect()
    }

    pub fn succeeded_indices(&self) -> Vec<usize> {
        self.succeeded.iter().map(|r| r.index).collect()
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total_attempts(&self) -> u32 {
        self.batches.iter().map(|b| b.attempts).sum()
    }
}

/// How the final text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    PlainText,
    Docx,
    PdfTextLayer,
    OcrWholeDocument,
    OcrBatched,
}

/// Summary counters for one extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub batches_planned: usize,
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    pub total_attempts: u32,
    pub duration_ms: u64,
    pub chars: usize,
}

/// Complete output of [`crate::extract::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Final text handed to downstream term extraction.
    pub text: String,
    pub kind: FileKind,
    pub method: ExtractionMethod,
    /// Present only for the batched OCR path.
    pub job: Option<JobOutcome>,
    pub stats: ExtractionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_range_display_is_one_indexed_inclusive() {
        assert_eq!(PageRange::new(0, 20).to_string(), "pages 1-20");
        assert_eq!(PageRange::new(100, 113).to_string(), "pages 101-113");
    }

    #[test]
    fn batch_marker() {
        let batch = Batch::new(4, PageRange::new(80, 100));
        assert_eq!(batch.marker(), "[Batch 5: pages 81-100]");
    }

    #[test]
    fn batch_lifecycle_edges() {
        let mut batch = Batch::new(0, PageRange::new(0, 10));
        assert!(batch.transition(BatchStatus::Succeeded).is_err());
        batch.transition(BatchStatus::Running).unwrap();
        batch.transition(BatchStatus::Running).unwrap();
        batch.transition(BatchStatus::Succeeded).unwrap();
        assert!(batch.status.is_terminal());
        assert!(batch.transition(BatchStatus::Running).is_err());
        assert!(batch.transition(BatchStatus::FailedPermanently).is_err());
    }

    #[test]
    fn document_identity() {
        let doc = Document::new("/data/in/Annual Report.pdf", 120, 4_000_000);
        assert_eq!(doc.name(), "Annual Report.pdf");
        assert_eq!(doc.stem(), "Annual Report");
    }
}
