//! Batch executor: drives every planned batch to a terminal state.
//!
//! ## Execution model
//!
//! Batches run strictly in index order, one at a time. Each batch gets up to
//! `max_retries` attempts; an attempt is split → submit → poll → fetch. The
//! decision after an attempt is made by the pure [`classify_attempt`], so the
//! retry policy is testable without a client.
//!
//! A batch that spends its budget is recorded as failed and the job moves
//! on. Only three things end a job early or without output:
//!
//! * cancellation, checked around every remote call and every backoff sleep,
//! * every batch failing (`AllBatchesFailed`),
//! * the result store becoming unwritable.
//!
//! Successful results are appended to the [`ResultStore`] before the next
//! batch starts.

use crate::config::{ExportFormat, OcrConfig};
use crate::error::{BatchError, DocScanError, RecognitionError};
use crate::output::{Batch, BatchResult, BatchStatus, Document, FailedBatch, JobOutcome};
use crate::pipeline::aggregate::{aggregate_batched, normalise_text};
use crate::pipeline::split::DocumentSplitter;
use crate::pipeline::store::ResultStore;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::recognition::{cancellable_sleep, recognize, PollSettings, RecognitionClient};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What to do after one attempt.
#[derive(Debug)]
pub enum AttemptVerdict {
    Succeeded(String),
    /// Failed with budget left; wait and try again.
    Retry(BatchError),
    /// Failed on the last allowed attempt.
    GiveUp(BatchError),
}

/// Classify the result of attempt number `attempt` (1-indexed).
///
/// Cancellation must be handled by the caller before classifying.
pub fn classify_attempt(
    attempt: u32,
    max_retries: u32,
    result: Result<String, BatchError>,
) -> AttemptVerdict {
    match result {
        Ok(text) => AttemptVerdict::Succeeded(text),
        Err(e) if attempt < max_retries => AttemptVerdict::Retry(e),
        Err(e) => AttemptVerdict::GiveUp(e),
    }
}

/// The executor's view of [`OcrConfig`].
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub poll: PollSettings,
    pub export_format: ExportFormat,
    pub batch_size: usize,
    pub output_dir: PathBuf,
}

impl From<&OcrConfig> for ExecutorSettings {
    fn from(config: &OcrConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            poll: PollSettings::from(config),
            export_format: config.export_format,
            batch_size: config.batch_size,
            output_dir: config.output_dir.clone(),
        }
    }
}

enum Resolved {
    Succeeded(BatchResult),
    Failed(FailedBatch),
}

/// Sequential batch executor with per-batch retries.
pub struct BatchExecutor {
    splitter: Arc<dyn DocumentSplitter>,
    client: Arc<dyn RecognitionClient>,
    settings: ExecutorSettings,
    progress: ProgressCallback,
}

impl BatchExecutor {
    pub fn new(
        splitter: Arc<dyn DocumentSplitter>,
        client: Arc<dyn RecognitionClient>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            splitter,
            client,
            settings,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        if let Some(cb) = progress {
            self.progress = cb;
        }
        self
    }

    /// Run every batch of `document` and aggregate the successes.
    ///
    /// Starts a fresh result store for the document. On cancellation the
    /// store keeps every batch that already succeeded and gets no banner.
    pub async fn run(
        &self,
        document: &Document,
        mut batches: Vec<Batch>,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, DocScanError> {
        if batches.is_empty() {
            return Err(DocScanError::InvalidPlan("no batches to execute".into()));
        }
        let total = batches.len();
        let job_start = Instant::now();

        let mut store =
            ResultStore::create(&self.settings.output_dir, document, self.settings.batch_size)
                .await?;

        info!(
            "Batched OCR of {}: {} pages in {} batches of ≤{} (store: {})",
            document.name(),
            document.page_count,
            total,
            self.settings.batch_size,
            store.path().display()
        );
        self.progress.on_job_start(total, document.page_count);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for batch in batches.iter_mut() {
            match self.run_batch(document, batch, total, &mut store, cancel).await? {
                Resolved::Succeeded(result) => succeeded.push(result),
                Resolved::Failed(failure) => failed.push(failure),
            }
        }

        self.progress.on_job_complete(total, succeeded.len());

        if succeeded.is_empty() {
            return Err(DocScanError::AllBatchesFailed {
                total,
                retries: self.settings.max_retries,
                first_error: failed
                    .first()
                    .map(|f| f.error.clone())
                    .unwrap_or_default(),
            });
        }

        store.finish(succeeded.len(), document.page_count).await?;
        let text = aggregate_batched(Some(&succeeded), store.path()).await?;

        if failed.is_empty() {
            info!(
                "All {} batches succeeded in {:.1}s",
                total,
                job_start.elapsed().as_secs_f64()
            );
        } else {
            warn!(
                "{}/{} batches succeeded; failed batches: {:?}",
                succeeded.len(),
                total,
                failed.iter().map(|f| f.index + 1).collect::<Vec<_>>()
            );
        }

        Ok(JobOutcome {
            source_name: document.name(),
            total_pages: document.page_count,
            batch_size: self.settings.batch_size,
            batches,
            succeeded,
            failed,
            text,
            store_path: store.path().to_path_buf(),
        })
    }

    async fn run_batch(
        &self,
        document: &Document,
        batch: &mut Batch,
        total: usize,
        store: &mut ResultStore,
        cancel: &CancellationToken,
    ) -> Result<Resolved, DocScanError> {
        batch.transition(BatchStatus::Running)?;
        self.progress.on_batch_start(batch.index, batch.range, total);
        let started = Instant::now();

        loop {
            batch.attempts += 1;
            let result = self.attempt(document, batch, cancel).await;
            if matches!(&result, Err(e) if e.is_cancellation()) {
                info!(batch = batch.index + 1, "Cancelled during attempt {}", batch.attempts);
                return Err(DocScanError::Cancelled {
                    completed: store.len(),
                });
            }

            match classify_attempt(batch.attempts, self.settings.max_retries, result) {
                AttemptVerdict::Succeeded(text) => {
                    let result = BatchResult {
                        index: batch.index,
                        range: batch.range,
                        text: normalise_text(&text),
                        completed_at: Utc::now(),
                    };
                    store.append(&batch.marker(), &result).await?;
                    batch.transition(BatchStatus::Succeeded)?;

                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    let chars = result.text.chars().count();
                    info!(
                        "Batch {}/{} ({}) done: {} chars, {} attempt(s), {}ms",
                        batch.index + 1,
                        total,
                        batch.range,
                        chars,
                        batch.attempts,
                        elapsed_ms
                    );
                    self.progress
                        .on_batch_complete(batch.index, batch.range, total, chars, elapsed_ms);
                    return Ok(Resolved::Succeeded(result));
                }
                AttemptVerdict::Retry(err) => {
                    let msg = err.to_string();
                    warn!(
                        "Batch {}/{} attempt {}/{} failed, retrying in {}s: {}",
                        batch.index + 1,
                        total,
                        batch.attempts,
                        self.settings.max_retries,
                        self.settings.retry_delay.as_secs(),
                        msg
                    );
                    self.progress.on_batch_retry(batch.index, batch.attempts, &msg);

                    if cancellable_sleep(cancel, self.settings.retry_delay)
                        .await
                        .is_err()
                    {
                        return Err(DocScanError::Cancelled {
                            completed: store.len(),
                        });
                    }
                    batch.transition(BatchStatus::Running)?;
                }
                AttemptVerdict::GiveUp(err) => {
                    let msg = err.to_string();
                    batch.transition(BatchStatus::FailedPermanently)?;
                    warn!(
                        "Batch {}/{} ({}) failed permanently after {} attempt(s): {}",
                        batch.index + 1,
                        total,
                        batch.range,
                        batch.attempts,
                        msg
                    );
                    self.progress
                        .on_batch_failed(batch.index, batch.range, total, &msg);
                    return Ok(Resolved::Failed(FailedBatch {
                        index: batch.index,
                        range: batch.range,
                        attempts: batch.attempts,
                        error: msg,
                    }));
                }
            }
        }
    }

    /// One attempt. The sub-document is dropped when the attempt resolves.
    async fn attempt(
        &self,
        document: &Document,
        batch: &Batch,
        cancel: &CancellationToken,
    ) -> Result<String, BatchError> {
        let recognition = |source: RecognitionError| BatchError::Recognition {
            batch: batch.index,
            source,
        };
        if cancel.is_cancelled() {
            return Err(recognition(RecognitionError::Cancelled));
        }

        let sub = self.splitter.split(document, batch.index, batch.range).await?;
        let text = recognize(
            self.client.as_ref(),
            sub.path(),
            self.settings.export_format,
            self.settings.poll,
            cancel,
        )
        .await
        .map_err(recognition)?;
        drop(sub);
        Ok(text)
    }
}
