//! PDF access through pdfium: page count, text layer, page-range copies.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not run on Tokio worker threads. Every public `async fn`
//! here moves the work onto the blocking pool and binds its own [`Pdfium`]
//! instance there.

use crate::capabilities::PdfEngine;
use crate::error::DocScanError;
use crate::output::PageRange;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pages copied into a new PDF, plus the pages that could not be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub skipped: Vec<usize>,
}

/// Count the pages of a PDF without extracting anything.
pub async fn page_count(engine: &PdfEngine, pdf_path: &Path) -> Result<usize, DocScanError> {
    let engine = engine.clone();
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let pdfium = engine.bind()?;
        let document = open(&pdfium, &path)?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| DocScanError::Internal(format!("Page-count task panicked: {}", e)))?
}

/// Concatenated text layer of every page, pages separated by a newline.
pub async fn text_layer(engine: &PdfEngine, pdf_path: &Path) -> Result<String, DocScanError> {
    let engine = engine.clone();
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || text_layer_blocking(&engine, &path))
        .await
        .map_err(|e| DocScanError::Internal(format!("Text-layer task panicked: {}", e)))?
}

fn text_layer_blocking(engine: &PdfEngine, pdf_path: &Path) -> Result<String, DocScanError> {
    let pdfium = engine.bind()?;
    let document = open(&pdfium, pdf_path)?;

    let mut text = String::new();
    for (i, page) in document.pages().iter().enumerate() {
        match page.text() {
            Ok(page_text) => {
                text.push_str(&page_text.all());
                text.push('\n');
            }
            Err(e) => warn!("Page {}: text layer unreadable: {:?}", i + 1, e),
        }
    }
    debug!("Text layer of {}: {} chars", pdf_path.display(), text.len());
    Ok(text)
}

/// Copy `range` of `source` into a new PDF at `destination`.
///
/// Pages that pdfium refuses to copy are skipped and reported; the caller
/// decides whether a report with zero copied pages is an error.
pub async fn copy_range(
    engine: &PdfEngine,
    source: &Path,
    range: PageRange,
    destination: &Path,
) -> Result<CopyReport, DocScanError> {
    let engine = engine.clone();
    let source = source.to_path_buf();
    let destination: PathBuf = destination.to_path_buf();

    tokio::task::spawn_blocking(move || copy_range_blocking(&engine, &source, range, &destination))
        .await
        .map_err(|e| DocScanError::Internal(format!("Split task panicked: {}", e)))?
}

fn copy_range_blocking(
    engine: &PdfEngine,
    source_path: &Path,
    range: PageRange,
    destination: &Path,
) -> Result<CopyReport, DocScanError> {
    let pdfium = engine.bind()?;
    let source = open(&pdfium, source_path)?;
    let total = source.pages().len() as usize;

    let mut target = pdfium.create_new_pdf().map_err(|e| DocScanError::Internal(format!(
        "Cannot create PDF: {:?}",
        e
    )))?;

    let mut report = CopyReport {
        copied: 0,
        skipped: Vec::new(),
    };

    for page in range.start..range.end {
        if page >= total {
            warn!("Skipping page {} (out of range, total={})", page + 1, total);
            report.skipped.push(page);
            continue;
        }
        match target
            .pages_mut()
            .copy_page_from_document(&source, page as u16, report.copied as u16)
        {
            Ok(()) => report.copied += 1,
            Err(e) => {
                warn!("Skipping page {}: copy failed: {:?}", page + 1, e);
                report.skipped.push(page);
            }
        }
    }

    if report.copied > 0 {
        target
            .save_to_file(destination)
            .map_err(|e| DocScanError::Internal(format!(
                "Cannot write {}: {:?}",
                destination.display(),
                e
            )))?;
        info!(
            "Wrote {} ({} pages, {} skipped)",
            destination.display(),
            report.copied,
            report.skipped.len()
        );
    }

    Ok(report)
}

fn open<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, DocScanError> {
    pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let detail = format!("{:?}", e);
        if detail.contains("Password") || detail.contains("password") {
            DocScanError::CorruptDocument {
                path: path.to_path_buf(),
                detail: "the PDF is encrypted and requires a password".into(),
            }
        } else {
            DocScanError::CorruptDocument {
                path: path.to_path_buf(),
                detail,
            }
        }
    })
}
