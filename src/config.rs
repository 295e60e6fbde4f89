//! Configuration types for document extraction and batched OCR.
//!
//! All extraction behaviour is controlled through [`OcrConfig`], built via
//! its [`OcrConfigBuilder`]. The values are read-only inputs to the planner,
//! the executor and the polling loop; nothing in the pipeline mutates them.

use crate::error::DocScanError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for an extraction run.
///
/// Built via [`OcrConfig::builder()`] or using [`OcrConfig::default()`].
///
/// # Example
/// ```rust
/// use docscan_ocr::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .threshold_pages(50)
///     .batch_size(20)
///     .max_retries(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 20);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Allow splitting large documents into page-range batches. Default: true.
    pub batch_enabled: bool,

    /// Documents with more pages than this are batched. Default: 50.
    pub threshold_pages: usize,

    /// Documents larger than this many MiB are batched. Default: 20.0.
    ///
    /// The remote service rejects very large uploads and slows down sharply
    /// well before that limit, so size alone can force batching even for a
    /// document with few (but heavy, image-only) pages.
    pub threshold_size_mb: f64,

    /// Pages per batch. Default: 20.
    pub batch_size: usize,

    /// Attempts per batch before it is marked permanently failed. Default: 3.
    ///
    /// Counts attempts, not retries: with 3 a batch is tried at most 3 times.
    pub max_retries: u32,

    /// Fixed delay between attempts of the same batch, in seconds. Default: 5.
    pub retry_delay_secs: u64,

    /// Interval between task status queries, in seconds. Default: 5.
    pub check_interval_secs: u64,

    /// Maximum wait for one remote task, in seconds. Default: 300.
    ///
    /// Independent of `max_retries`: every attempt gets a fresh full wait.
    pub max_wait_secs: u64,

    /// Output format requested from the remote service. Default: [`ExportFormat::Txt`].
    pub export_format: ExportFormat,

    /// Directory holding the incremental result stores. Default: `ocr_output`.
    pub output_dir: PathBuf,

    /// A PDF text layer shorter than this is treated as a scanned PDF. Default: 50.
    pub min_text_chars: usize,

    /// Skip the PDF text layer and always run OCR. Default: false.
    pub force_ocr: bool,

    /// Remote service credentials. If None, read lazily from the environment.
    pub credentials: Option<Credentials>,

    /// Base URL of the remote PDF OCR service.
    pub service_url: String,

    /// Optional per-batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            batch_enabled: true,
            threshold_pages: 50,
            threshold_size_mb: 20.0,
            batch_size: 20,
            max_retries: 3,
            retry_delay_secs: 5,
            check_interval_secs: 5,
            max_wait_secs: 300,
            export_format: ExportFormat::default(),
            output_dir: PathBuf::from("ocr_output"),
            min_text_chars: 50,
            force_ocr: false,
            credentials: None,
            service_url: crate::recognition::xunfei::DEFAULT_BASE_URL.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("batch_enabled", &self.batch_enabled)
            .field("threshold_pages", &self.threshold_pages)
            .field("threshold_size_mb", &self.threshold_size_mb)
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("max_wait_secs", &self.max_wait_secs)
            .field("export_format", &self.export_format)
            .field("output_dir", &self.output_dir)
            .field("min_text_chars", &self.min_text_chars)
            .field("force_ocr", &self.force_ocr)
            .field("credentials", &self.credentials)
            .field("service_url", &self.service_url)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Size threshold in bytes.
    pub fn threshold_size_bytes(&self) -> f64 {
        self.threshold_size_mb * 1024.0 * 1024.0
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn batch_enabled(mut self, v: bool) -> Self {
        self.config.batch_enabled = v;
        self
    }

    pub fn threshold_pages(mut self, pages: usize) -> Self {
        self.config.threshold_pages = pages;
        self
    }

    pub fn threshold_size_mb(mut self, mb: f64) -> Self {
        self.config.threshold_size_mb = mb;
        self
    }

    pub fn batch_size(mut self, pages: usize) -> Self {
        self.config.batch_size = pages;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry_delay_secs = secs;
        self
    }

    pub fn check_interval_secs(mut self, secs: u64) -> Self {
        self.config.check_interval_secs = secs;
        self
    }

    pub fn max_wait_secs(mut self, secs: u64) -> Self {
        self.config.max_wait_secs = secs;
        self
    }

    pub fn export_format(mut self, format: ExportFormat) -> Self {
        self.config.export_format = format;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.config.force_ocr = v;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.config.service_url = url.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, DocScanError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(DocScanError::InvalidConfig(
                "batch_size must be ≥ 1".into(),
            ));
        }
        if c.max_retries == 0 {
            return Err(DocScanError::InvalidConfig(
                "max_retries must be ≥ 1 (it counts attempts)".into(),
            ));
        }
        if !c.threshold_size_mb.is_finite() || c.threshold_size_mb < 0.0 {
            return Err(DocScanError::InvalidConfig(format!(
                "threshold_size_mb must be a non-negative number, got {}",
                c.threshold_size_mb
            )));
        }
        if c.check_interval_secs == 0 {
            return Err(DocScanError::InvalidConfig(
                "check_interval_secs must be ≥ 1".into(),
            ));
        }
        if c.max_wait_secs == 0 {
            return Err(DocScanError::InvalidConfig(
                "max_wait_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums / value types ──────────────────────────────────────────────────

/// Output format tag sent to the remote service with each submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Plain text. (default)
    #[default]
    Txt,
    Markdown,
    Json,
    Word,
}

impl ExportFormat {
    /// Wire value of the `exportFormat` form field.
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Json => "json",
            ExportFormat::Word => "word",
        }
    }
}

/// Application credentials for the remote OCR service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
        }
    }

    /// Read `XUNFEI_APP_ID` / `XUNFEI_SECRET`. Returns None when either is unset or empty.
    pub fn from_env() -> Option<Self> {
        let app_id = std::env::var("XUNFEI_APP_ID").ok()?;
        let secret = std::env::var("XUNFEI_SECRET").ok()?;
        if app_id.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self { app_id, secret })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: String = self.app_id.chars().take(8).collect();
        f.debug_struct("Credentials")
            .field("app_id", &format!("{shown}***"))
            .field("secret", &"<redacted>")
            .finish()
    }
}
