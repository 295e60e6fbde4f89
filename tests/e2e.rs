//! End-to-end tests against a real pdfium library and, optionally, the live
//! OCR service.
//!
//! PDF tests build their own documents with pdfium and are skipped when no
//! pdfium library can be bound. The live-service test additionally needs
//! `E2E_ENABLED`, `XUNFEI_APP_ID`, `XUNFEI_SECRET` and a scanned PDF in
//! `./test_cases/`.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use docscan_ocr::pipeline::pdf;
use docscan_ocr::pipeline::split::PdfiumSplitter;
use docscan_ocr::{
    extract_with, BatchError, Capabilities, Document, DocumentSplitter, ExportFormat,
    ExtractionMethod, OcrConfig, OcrJob, PageRange, PdfEngine, RecognitionClient,
    RecognitionError, ResultLocator, TaskHandle, TaskStatus,
};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if no pdfium library can be bound.
macro_rules! pdf_engine_or_skip {
    () => {{
        match Capabilities::detect(&OcrConfig::default()).pdf_engine {
            Some(engine) => engine,
            None => {
                println!("SKIP — pdfium not found; set PDFIUM_LIB_PATH");
                return;
            }
        }
    }};
}

/// Write a PDF with `pages` pages, each carrying `text` and its page number.
fn make_pdf(engine: &PdfEngine, path: &Path, pages: usize, text: &str) {
    let pdfium = engine.bind().unwrap();
    let mut document = pdfium.create_new_pdf().unwrap();
    let font = document.fonts_mut().helvetica();
    for i in 0..pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .unwrap();
        if !text.is_empty() {
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(720.0),
                    &format!("{text} page {}", i + 1),
                    font,
                    PdfPoints::new(12.0),
                )
                .unwrap();
        }
    }
    document.save_to_file(path).unwrap();
}

/// Answers every task with the name of the submitted file.
#[derive(Default)]
struct EchoClient {
    submits: AtomicUsize,
}

#[async_trait]
impl RecognitionClient for EchoClient {
    async fn submit(&self, document: &Path, _: ExportFormat) -> Result<TaskHandle, RecognitionError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        let name = document.file_name().unwrap().to_string_lossy().into_owned();
        Ok(TaskHandle(name))
    }

    async fn poll(&self, task: &TaskHandle) -> Result<TaskStatus, RecognitionError> {
        Ok(TaskStatus::Done(ResultLocator(task.0.clone())))
    }

    async fn fetch(&self, locator: &ResultLocator) -> Result<String, RecognitionError> {
        Ok(format!("recognised {}", locator.0))
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_split_copies_exact_range() {
    let engine = pdf_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("long.pdf");
    make_pdf(&engine, &source, 45, "");

    let doc = Document::new(&source, 45, std::fs::metadata(&source).unwrap().len());
    let splitter = PdfiumSplitter::new(engine.clone());

    let sub = splitter.split(&doc, 1, PageRange::new(20, 40)).await.unwrap();
    assert_eq!(sub.pages_copied, 20);
    assert!(sub.skipped.is_empty());
    assert_eq!(
        sub.path().file_name().unwrap().to_string_lossy(),
        "long_batch002_p21-40.pdf"
    );
    assert_eq!(pdf::page_count(&engine, sub.path()).await.unwrap(), 20);

    let sub_path = sub.path().to_path_buf();
    drop(sub);
    assert!(!sub_path.exists());
}

#[tokio::test]
async fn test_split_skips_missing_pages() {
    let engine = pdf_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("short.pdf");
    make_pdf(&engine, &source, 45, "");

    let doc = Document::new(&source, 50, 1);
    let splitter = PdfiumSplitter::new(engine.clone());

    let sub = splitter.split(&doc, 2, PageRange::new(40, 50)).await.unwrap();
    assert_eq!(sub.pages_copied, 5);
    assert_eq!(sub.skipped, vec![45, 46, 47, 48, 49]);

    let err = splitter
        .split(&doc, 3, PageRange::new(60, 70))
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::EmptyBatch { batch: 3, .. }));
}

#[tokio::test]
async fn test_text_layer_pdf_needs_no_ocr() {
    let engine = pdf_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("born-digital.pdf");
    make_pdf(&engine, &source, 3, "Quality management terminology and definitions");

    let caps = Capabilities::new(Some(engine), false);
    let output = extract_with(&source, &OcrConfig::default(), &caps, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(output.method, ExtractionMethod::PdfTextLayer);
    assert!(output.text.contains("Quality management terminology"));
    assert_eq!(output.stats.total_pages, 3);
}

#[tokio::test]
async fn test_scanned_pdf_is_batched_through_real_splitter() {
    let engine = pdf_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("scan.pdf");
    make_pdf(&engine, &source, 25, "");

    let config = OcrConfig::builder()
        .threshold_pages(10)
        .batch_size(10)
        .output_dir(dir.path().join("ocr_output"))
        .build()
        .unwrap();
    let client = Arc::new(EchoClient::default());
    let mut job = OcrJob::new(config, Capabilities::new(Some(engine), false))
        .with_client(client.clone());

    let output = job.extract(&source, &CancellationToken::new()).await.unwrap();
    assert_eq!(output.method, ExtractionMethod::OcrBatched);
    assert_eq!(client.submits.load(Ordering::SeqCst), 3);
    assert_eq!(output.stats.batches_planned, 3);
    assert_eq!(output.stats.batches_succeeded, 3);
    assert_eq!(
        output.text,
        "[Batch 1: pages 1-10]\nrecognised scan_batch001_p1-10.pdf\n\n\
         [Batch 2: pages 11-20]\nrecognised scan_batch002_p11-20.pdf\n\n\
         [Batch 3: pages 21-25]\nrecognised scan_batch003_p21-25.pdf"
    );
    assert!(dir.path().join("ocr_output/scan_ocr_batches.txt").exists());
}

// ── live service ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_scanned_pdf() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run live OCR tests");
        return;
    }
    let path = test_cases_dir().join("scanned.pdf");
    if !path.exists() {
        println!("SKIP — test file not found: {}", path.display());
        return;
    }
    let engine = pdf_engine_or_skip!();

    let dir = tempfile::tempdir().unwrap();
    let config = OcrConfig::builder()
        .force_ocr(true)
        .output_dir(dir.path())
        .build()
        .unwrap();
    let caps = Capabilities::new(Some(engine), true);
    let output = extract_with(&path, &config, &caps, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!output.text.trim().is_empty());
    println!("{}", &output.text.chars().take(400).collect::<String>());
}
