//! Remote recognition contract: submit → poll → fetch.
//!
//! The remote OCR service is task based. A document is uploaded and the
//! service answers with a task id; the task is polled until it reports Done
//! (with a locator for the result) or Failed; the result is then downloaded.
//!
//! [`RecognitionClient`] is the narrow seam the pipeline depends on. The only
//! production implementation is [`xunfei::XunfeiClient`]; tests substitute
//! scripted fakes. The client itself never retries a submission: one call to
//! [`recognize`] is exactly one *attempt*, and attempt-level retry belongs to
//! the batch executor.
//!
//! Transient polling failures are different: a status query that fails in
//! transit is retried by [`wait_for_result`] on the next tick, bounded only
//! by the overall `max_wait_secs` deadline.

pub mod xunfei;

use crate::config::{ExportFormat, OcrConfig};
use crate::error::RecognitionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Opaque task identifier returned by [`RecognitionClient::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub String);

/// Where a finished task's output can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLocator(pub String);

/// Task status as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Processing,
    Done(ResultLocator),
    Failed(String),
}

/// A task-based remote recognition service.
#[async_trait]
pub trait RecognitionClient: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "remote"
    }

    /// Upload a single document. Fails with [`RecognitionError::Submission`].
    async fn submit(
        &self,
        document: &Path,
        format: ExportFormat,
    ) -> Result<TaskHandle, RecognitionError>;

    /// Query task status. Transit failures are [`RecognitionError::TransientNetwork`].
    async fn poll(&self, task: &TaskHandle) -> Result<TaskStatus, RecognitionError>;

    /// Download and decode a finished result. Fails with [`RecognitionError::Download`].
    async fn fetch(&self, locator: &ResultLocator) -> Result<String, RecognitionError>;
}

/// Polling cadence for one remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub check_interval: Duration,
    pub max_wait: Duration,
}

impl From<&OcrConfig> for PollSettings {
    fn from(config: &OcrConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.check_interval_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
        }
    }
}

/// Race `fut` against the cancellation token; cancellation wins ties.
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, RecognitionError>
where
    F: Future<Output = Result<T, RecognitionError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RecognitionError::Cancelled),
        result = fut => result,
    }
}

/// Sleep for `delay` unless cancelled first.
pub(crate) async fn cancellable_sleep(
    cancel: &CancellationToken,
    delay: Duration,
) -> Result<(), RecognitionError> {
    cancellable(cancel, async {
        sleep(delay).await;
        Ok(())
    })
    .await
}

/// Poll `task` every `check_interval` until it is Done, Failed, or the
/// `max_wait` deadline passes.
///
/// Unknown-but-running states and transient network errors keep the loop
/// waiting. Any other poll error ends the wait immediately.
pub async fn wait_for_result(
    client: &dyn RecognitionClient,
    task: &TaskHandle,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<ResultLocator, RecognitionError> {
    let start = Instant::now();

    loop {
        if start.elapsed() > settings.max_wait {
            return Err(RecognitionError::TaskTimeout {
                secs: settings.max_wait.as_secs(),
            });
        }

        match cancellable(cancel, client.poll(task)).await {
            Ok(TaskStatus::Done(locator)) => return Ok(locator),
            Ok(TaskStatus::Failed(reason)) => return Err(RecognitionError::TaskFailed(reason)),
            Ok(status) => {
                debug!(
                    task_id = %task.0,
                    ?status,
                    elapsed_s = start.elapsed().as_secs(),
                    "Task still running"
                );
            }
            Err(RecognitionError::TransientNetwork(detail)) => {
                warn!(task_id = %task.0, "Status query failed, will retry: {}", detail);
            }
            Err(e) => return Err(e),
        }

        cancellable_sleep(cancel, settings.check_interval).await?;
    }
}

/// One full attempt: submit `document`, wait for the task, fetch its text.
pub async fn recognize(
    client: &dyn RecognitionClient,
    document: &Path,
    format: ExportFormat,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<String, RecognitionError> {
    if cancel.is_cancelled() {
        return Err(RecognitionError::Cancelled);
    }

    let task = cancellable(cancel, client.submit(document, format)).await?;
    info!(client = client.name(), task_id = %task.0, "Recognition task submitted");

    let locator = wait_for_result(client, &task, settings, cancel).await?;
    debug!(task_id = %task.0, "Task done, downloading result");

    let text = cancellable(cancel, client.fetch(&locator)).await?;
    info!(task_id = %task.0, chars = text.chars().count(), "Recognition result downloaded");
    Ok(text)
}
