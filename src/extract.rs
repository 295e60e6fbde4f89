//! Extraction entry points.
//!
//! [`extract`] routes a file by kind: plain text and DOCX are read directly,
//! PDFs use their text layer when it has one, and scanned PDFs go through
//! an [`OcrJob`], which either sends the whole document in one remote call
//! or runs the batch executor.

use crate::capabilities::Capabilities;
use crate::config::{Credentials, OcrConfig};
use crate::error::DocScanError;
use crate::output::{Document, ExtractionMethod, ExtractionOutput, ExtractionStats, JobOutcome};
use crate::pipeline::aggregate::aggregate_whole;
use crate::pipeline::executor::{BatchExecutor, ExecutorSettings};
use crate::pipeline::planner::{self, ExecutionPlan, PlannerSettings};
use crate::pipeline::sniff::{self, FileKind};
use crate::pipeline::split::{DocumentSplitter, PdfiumSplitter};
use crate::pipeline::text::{self, PdfText};
use crate::pipeline::pdf;
use crate::recognition::xunfei::XunfeiClient;
use crate::recognition::{recognize, PollSettings, RecognitionClient};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of an OCR job.
#[derive(Debug, Clone)]
pub enum OcrRun {
    /// One remote call; text tagged `[Scanned PDF - <name>]`.
    WholeDocument(String),
    Batched(JobOutcome),
}

impl OcrRun {
    pub fn text(&self) -> &str {
        match self {
            OcrRun::WholeDocument(text) => text,
            OcrRun::Batched(outcome) => &outcome.text,
        }
    }
}

/// OCR of one scanned document, with its collaborators built on first use.
///
/// The remote client is created by [`OcrJob::ensure_client`] at the top of
/// [`OcrJob::run`], after planning, so a bad plan never touches the network
/// and a missing credential is reported as `ClientInit`. Tests inject fakes
/// with [`OcrJob::with_client`] and [`OcrJob::with_splitter`].
pub struct OcrJob {
    config: OcrConfig,
    capabilities: Capabilities,
    client: Option<Arc<dyn RecognitionClient>>,
    splitter: Option<Arc<dyn DocumentSplitter>>,
}

impl OcrJob {
    pub fn new(config: OcrConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
            client: None,
            splitter: None,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn RecognitionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_splitter(mut self, splitter: Arc<dyn DocumentSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// True if this job can reach a remote service.
    pub fn can_recognize(&self) -> bool {
        self.client.is_some() || self.capabilities.remote_ocr
    }

    /// Build the remote client if it does not exist yet.
    pub fn ensure_client(&mut self) -> Result<Arc<dyn RecognitionClient>, DocScanError> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }
        let credentials = self
            .config
            .credentials
            .clone()
            .or_else(Credentials::from_env)
            .ok_or_else(|| {
                DocScanError::ClientInit(
                    "no credentials configured; set XUNFEI_APP_ID and XUNFEI_SECRET".into(),
                )
            })?;
        let client: Arc<dyn RecognitionClient> =
            Arc::new(XunfeiClient::new(credentials, self.config.service_url.clone())?);
        debug!("Recognition client '{}' initialised", client.name());
        self.client = Some(Arc::clone(&client));
        Ok(client)
    }

    fn ensure_splitter(&mut self) -> Result<Arc<dyn DocumentSplitter>, DocScanError> {
        if let Some(splitter) = &self.splitter {
            return Ok(Arc::clone(splitter));
        }
        let engine = self.capabilities.require_pdf()?.clone();
        let splitter: Arc<dyn DocumentSplitter> = Arc::new(PdfiumSplitter::new(engine));
        self.splitter = Some(Arc::clone(&splitter));
        Ok(splitter)
    }

    /// Plan and run OCR for `document`.
    ///
    /// # Errors
    /// `InvalidPlan` before any remote call, `ClientInit` when no client can
    /// be built, `AllBatchesFailed` when no batch succeeded, and `Cancelled`
    /// when `cancel` fires. Partial batch failure is not an error.
    pub async fn run(
        &mut self,
        document: &Document,
        cancel: &CancellationToken,
    ) -> Result<OcrRun, DocScanError> {
        let plan = planner::plan(
            document.page_count,
            document.size_bytes,
            &PlannerSettings::from(&self.config),
        )?;
        let client = self.ensure_client()?;

        match plan {
            ExecutionPlan::WholeDocument => {
                info!(
                    "Whole-document OCR of {} ({} pages, {} bytes)",
                    document.name(),
                    document.page_count,
                    document.size_bytes
                );
                let raw = recognize(
                    client.as_ref(),
                    &document.path,
                    self.config.export_format,
                    PollSettings::from(&self.config),
                    cancel,
                )
                .await
                .map_err(|source| {
                    if source.is_cancellation() {
                        DocScanError::Cancelled { completed: 0 }
                    } else {
                        DocScanError::RecognitionFailed {
                            path: document.path.clone(),
                            source,
                        }
                    }
                })?;
                aggregate_whole(&document.name(), &raw)
                    .map(OcrRun::WholeDocument)
                    .ok_or_else(|| DocScanError::NoTextExtracted {
                        path: document.path.clone(),
                        reason: "the recognition service returned no text".into(),
                    })
            }
            ExecutionPlan::Batched(batches) => {
                let splitter = self.ensure_splitter()?;
                let executor =
                    BatchExecutor::new(splitter, client, ExecutorSettings::from(&self.config))
                        .with_progress(self.config.progress_callback.clone());
                executor.run(document, batches, cancel).await.map(OcrRun::Batched)
            }
        }
    }

    /// Detect the kind of `path` and extract its text.
    pub async fn extract(
        &mut self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutput, DocScanError> {
        let started = Instant::now();
        let kind = sniff::detect(path)?;
        info!("Extracting {} ({})", path.display(), kind);

        let (text, method, job, mut stats) = match kind {
            FileKind::Text => (
                text::extract_plain_text(path).await?,
                ExtractionMethod::PlainText,
                None,
                ExtractionStats::default(),
            ),
            FileKind::Docx => (
                text::extract_docx(path).await?,
                ExtractionMethod::Docx,
                None,
                ExtractionStats::default(),
            ),
            FileKind::Pdf => self.extract_pdf(path, cancel).await?,
            FileKind::Image => {
                return Err(DocScanError::UnsupportedFileType {
                    path: path.to_path_buf(),
                    kind: kind.to_string(),
                    hint: "Images are not recognised directly; convert them to PDF first.".into(),
                })
            }
            FileKind::Unknown => {
                return Err(DocScanError::UnsupportedFileType {
                    path: path.to_path_buf(),
                    kind: kind.to_string(),
                    hint: "Supported: .txt .md .html .xml .pdf .docx".into(),
                })
            }
        };

        stats.chars = text.chars().count();
        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Extracted {} chars from {} via {:?} in {}ms",
            stats.chars,
            path.display(),
            method,
            stats.duration_ms
        );

        Ok(ExtractionOutput {
            text,
            kind,
            method,
            job,
            stats,
        })
    }

    async fn extract_pdf(
        &mut self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(String, ExtractionMethod, Option<JobOutcome>, ExtractionStats), DocScanError> {
        let engine = self.capabilities.require_pdf()?.clone();
        let page_count = pdf::page_count(&engine, path).await?;
        let mut stats = ExtractionStats {
            total_pages: page_count,
            ..Default::default()
        };

        if self.config.force_ocr {
            info!("OCR forced for {}", path.display());
        } else {
            match text::extract_pdf_text(&engine, path, self.config.min_text_chars).await? {
                PdfText::Text(text) => {
                    return Ok((text, ExtractionMethod::PdfTextLayer, None, stats));
                }
                PdfText::Scanned { chars } => {
                    info!(
                        "{} looks scanned ({} text-layer chars), using remote OCR",
                        path.display(),
                        chars
                    );
                }
            }
        }

        if !self.can_recognize() {
            self.capabilities.require_remote_ocr()?;
        }

        let size_bytes = tokio::fs::metadata(path)
            .await
            .map_err(|e| DocScanError::Internal(format!("Cannot stat {}: {}", path.display(), e)))?
            .len();
        let document = Document::new(path, page_count, size_bytes);

        match self.run(&document, cancel).await? {
            OcrRun::WholeDocument(text) => {
                stats.total_attempts = 1;
                Ok((text, ExtractionMethod::OcrWholeDocument, None, stats))
            }
            OcrRun::Batched(outcome) => {
                stats.batches_planned = outcome.planned_count();
                stats.batches_succeeded = outcome.succeeded.len();
                stats.batches_failed = outcome.failed.len();
                stats.total_attempts = outcome.total_attempts();
                Ok((outcome.text.clone(), ExtractionMethod::OcrBatched, Some(outcome), stats))
            }
        }
    }
}

/// Extract the text of a file.
///
/// This is the primary entry point for the library. Capabilities are probed
/// once per call; use [`extract_with`] to reuse a probe or to cancel.
///
/// # Errors
/// Returns `Err(DocScanError)` only for fatal errors. A batched OCR job where
/// some batches failed still returns `Ok`; check `output.job`.
pub async fn extract(
    path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<ExtractionOutput, DocScanError> {
    let capabilities = Capabilities::detect(config);
    extract_with(path, config, &capabilities, &CancellationToken::new()).await
}

/// [`extract`] with explicit capabilities and a cancellation token.
pub async fn extract_with(
    path: impl AsRef<Path>,
    config: &OcrConfig,
    capabilities: &Capabilities,
    cancel: &CancellationToken,
) -> Result<ExtractionOutput, DocScanError> {
    OcrJob::new(config.clone(), capabilities.clone())
        .extract(path.as_ref(), cancel)
        .await
}

/// Extract a file and write the text to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<ExtractionStats, DocScanError> {
    let output = extract(path, config).await?;
    write_atomic(output_path.as_ref(), &output.text).await?;
    Ok(output.stats)
}

/// Write `content` to `path` through a sibling `<path>.tmp` and a rename,
/// creating parent directories as needed.
pub async fn write_atomic(path: &Path, content: &str) -> Result<(), DocScanError> {
    let write_err = |source| DocScanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, content).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<ExtractionOutput, DocScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(path, config))
}
