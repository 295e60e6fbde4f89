//! # docscan-ocr
//!
//! Extract text from documents for downstream term extraction, using a
//! remote, task-based OCR service for scanned PDFs.
//!
//! ## Why batching?
//!
//! The remote service takes one document per task, and long or heavy scans
//! time out or get rejected. Documents above a page or size threshold are cut
//! into page-range batches that are recognised one at a time, each with its
//! own retry budget. One bad batch costs its pages, not the whole document,
//! and every finished batch is synced to disk before the next one starts.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Sniff    magic bytes, then extension
//!  ├─ 2. Direct   plain text / DOCX / PDF text layer (done if long enough)
//!  ├─ 3. Plan     whole document or ceil(P / batch_size) page ranges
//!  ├─ 4. Execute  split → submit → poll → fetch, bounded retries per batch
//!  ├─ 5. Store    append + fsync each successful batch
//!  └─ 6. Output   ordered text with [Batch i: pages a-b] markers
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docscan_ocr::{extract, OcrConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from XUNFEI_APP_ID / XUNFEI_SECRET
//!     let config = OcrConfig::default();
//!     let output = extract("scanned.pdf", &config).await?;
//!     println!("{}", output.text);
//!     if let Some(job) = &output.job {
//!         eprintln!("{}/{} batches ok", job.succeeded.len(), job.planned_count());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docscan-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capabilities;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod recognition;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capabilities::{Capabilities, PdfEngine, PdfLibrary};
pub use config::{Credentials, ExportFormat, OcrConfig, OcrConfigBuilder};
pub use error::{BatchError, DocScanError, RecognitionError};
pub use extract::{
    extract, extract_sync, extract_to_file, extract_with, write_atomic, OcrJob, OcrRun,
};
pub use output::{
    Batch, BatchResult, BatchStatus, Document, ExtractionMethod, ExtractionOutput,
    ExtractionStats, FailedBatch, JobOutcome, PageRange,
};
pub use pipeline::sniff::FileKind;
pub use pipeline::split::{DocumentSplitter, SubDocument};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use recognition::{RecognitionClient, ResultLocator, TaskHandle, TaskStatus};
pub use tokio_util::sync::CancellationToken;
