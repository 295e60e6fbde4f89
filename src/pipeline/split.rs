//! Document splitting: one standalone sub-document per batch.
//!
//! A [`SubDocument`] lives in its own [`TempDir`]; dropping it deletes the
//! file. The executor drops it as soon as the batch resolves, so at most one
//! batch-sized copy of a large document exists on disk at any time.

use crate::capabilities::PdfEngine;
use crate::error::BatchError;
use crate::output::{Document, PageRange};
use crate::pipeline::pdf;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;

/// A transient sub-document holding the pages of one batch.
#[derive(Debug)]
pub struct SubDocument {
    path: PathBuf,
    pub range: PageRange,
    pub pages_copied: usize,
    /// 0-indexed source pages that could not be copied.
    pub skipped: Vec<usize>,
    _temp_dir: TempDir,
}

impl SubDocument {
    /// Wrap a file created inside `temp_dir`. The directory is removed on drop.
    pub fn new(
        temp_dir: TempDir,
        path: PathBuf,
        range: PageRange,
        pages_copied: usize,
        skipped: Vec<usize>,
    ) -> Self {
        Self {
            path,
            range,
            pages_copied,
            skipped,
            _temp_dir: temp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Produces the sub-document for one batch.
#[async_trait]
pub trait DocumentSplitter: Send + Sync {
    /// Copy pages `[range.start, range.end)` of `document` into a new document.
    ///
    /// Uncopyable pages are skipped with a warning; zero copied pages is
    /// [`BatchError::EmptyBatch`].
    async fn split(
        &self,
        document: &Document,
        batch_index: usize,
        range: PageRange,
    ) -> Result<SubDocument, BatchError>;
}

/// Splits PDFs with pdfium.
pub struct PdfiumSplitter {
    engine: PdfEngine,
}

impl PdfiumSplitter {
    pub fn new(engine: PdfEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl DocumentSplitter for PdfiumSplitter {
    async fn split(
        &self,
        document: &Document,
        batch_index: usize,
        range: PageRange,
    ) -> Result<SubDocument, BatchError> {
        let temp_dir = TempDir::new().map_err(|e| BatchError::Split {
            batch: batch_index,
            detail: format!("cannot create temp dir: {e}"),
        })?;
        let path = temp_dir.path().join(format!(
            "{}_batch{:03}_p{}-{}.pdf",
            document.stem(),
            batch_index + 1,
            range.start + 1,
            range.end
        ));

        let report = pdf::copy_range(&self.engine, &document.path, range, &path)
            .await
            .map_err(|e| BatchError::Split {
                batch: batch_index,
                detail: e.to_string(),
            })?;

        if report.copied == 0 {
            return Err(BatchError::EmptyBatch {
                batch: batch_index,
                start: range.start,
                end: range.end,
            });
        }
        if !report.skipped.is_empty() {
            warn!(
                batch = batch_index + 1,
                "Sub-document is missing {} page(s): {:?}",
                report.skipped.len(),
                report.skipped.iter().map(|p| p + 1).collect::<Vec<_>>()
            );
        }

        Ok(SubDocument::new(
            temp_dir,
            path,
            range,
            report.copied,
            report.skipped,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_sub_document_removes_its_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("part.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let dir_path = dir.path().to_path_buf();

        let sub = SubDocument::new(dir, path.clone(), PageRange::new(0, 3), 3, vec![]);
        assert!(sub.path().exists());
        drop(sub);
        assert!(!path.exists());
        assert!(!dir_path.exists());
    }
}
