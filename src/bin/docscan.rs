//! CLI binary for docscan-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `OcrConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docscan_ocr::pipeline::pdf;
use docscan_ocr::pipeline::planner::{self, PlannerSettings};
use docscan_ocr::{
    extract_with, write_atomic, BatchProgressCallback, CancellationToken, Capabilities, Credentials,
    DocScanError, ExportFormat, ExtractionOutput, OcrConfig, PageRange, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over batches plus a log line per
/// resolved batch.
struct CliProgressCallback {
    bar: ProgressBar,
    retries: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            retries: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} batches  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Recognising");
        self.bar.reset_eta();
    }

    /// Remove the bar from the terminal; a no-op once the job completed.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_job_start(&self, total_batches: usize, total_pages: usize) {
        self.activate_bar(total_batches);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "{total_pages} pages in {total_batches} batches"
            ))
        ));
    }

    fn on_batch_start(&self, _index: usize, range: PageRange, _total: usize) {
        self.bar.set_message(range.to_string());
    }

    fn on_batch_retry(&self, index: usize, attempt: u32, error: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Batch {:>3}  attempt {} failed: {}",
            yellow("↻"),
            index + 1,
            attempt,
            dim(&truncate(error, 80)),
        ));
    }

    fn on_batch_complete(
        &self,
        index: usize,
        range: PageRange,
        total: usize,
        chars: usize,
        elapsed_ms: u64,
    ) {
        self.bar.println(format!(
            "  {} Batch {:>3}/{:<3} {:<16} {}  {}",
            green("✓"),
            index + 1,
            total,
            range,
            dim(&format!("{chars:>6} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_batch_failed(&self, index: usize, range: PageRange, total: usize, error: &str) {
        self.bar.println(format!(
            "  {} Batch {:>3}/{:<3} {:<16} {}",
            red("✗"),
            index + 1,
            total,
            range,
            red(&truncate(error, 80)),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();
        let retries = self.retries.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} batches recognised  {}",
                green("✔"),
                bold(&succeeded.to_string()),
                dim(&format!("({retries} retries)"))
            );
        } else {
            eprintln!(
                "{} {}/{} batches recognised  ({} failed)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text (stdout)
  docscan report.pdf

  # Write to a file
  docscan scanned-book.pdf -o book.txt

  # Smaller batches, more attempts
  docscan --batch-size 10 --max-retries 5 scanned-book.pdf -o book.txt

  # Skip the text layer and always OCR
  docscan --force-ocr contract.pdf

  # Show the batch plan without calling the OCR service
  docscan --plan-only scanned-book.pdf

  # Full run report as JSON
  docscan --json scanned-book.pdf > report.json

BATCHING:
  A PDF is split when it has more than --threshold-pages pages or is larger
  than --threshold-size-mb. Each batch is retried up to --max-retries times;
  a batch that still fails is reported and skipped. Finished batches are
  written to <output-dir>/<name>_ocr_batches.txt as they complete.

ENVIRONMENT VARIABLES:
  XUNFEI_APP_ID        OCR service application id
  XUNFEI_SECRET        OCR service secret
  PDFIUM_LIB_PATH      Path to libpdfium (file or directory)
  RUST_LOG             Log filter, overrides -v / -q
"#;

/// Extract text from documents, with batched remote OCR for scanned PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "docscan",
    version,
    about = "Extract text from documents, with batched remote OCR for scanned PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to extract (.txt, .md, .pdf, .docx, …).
    input: PathBuf,

    /// Write the text to this file instead of stdout.
    #[arg(short, long, env = "DOCSCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// OCR service application id.
    #[arg(long, env = "XUNFEI_APP_ID", hide_env_values = true)]
    app_id: Option<String>,

    /// OCR service secret.
    #[arg(long, env = "XUNFEI_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// OCR service base URL.
    #[arg(long, env = "DOCSCAN_SERVICE_URL")]
    service_url: Option<String>,

    /// Never split; send every scanned PDF in one task.
    #[arg(long, env = "DOCSCAN_NO_BATCH")]
    no_batch: bool,

    /// Batch documents with more pages than this.
    #[arg(long, env = "DOCSCAN_THRESHOLD_PAGES", default_value_t = 50)]
    threshold_pages: usize,

    /// Batch documents larger than this many MiB.
    #[arg(long, env = "DOCSCAN_THRESHOLD_SIZE_MB", default_value_t = 20.0)]
    threshold_size_mb: f64,

    /// Pages per batch.
    #[arg(long, env = "DOCSCAN_BATCH_SIZE", default_value_t = 20,
          value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: u64,

    /// Attempts per batch before it is skipped.
    #[arg(long, env = "DOCSCAN_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Seconds between attempts of a batch.
    #[arg(long, env = "DOCSCAN_RETRY_DELAY", default_value_t = 5)]
    retry_delay: u64,

    /// Seconds between task status checks.
    #[arg(long, env = "DOCSCAN_CHECK_INTERVAL", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    check_interval: u64,

    /// Maximum seconds to wait for one task.
    #[arg(long, env = "DOCSCAN_MAX_WAIT", default_value_t = 300)]
    max_wait: u64,

    /// Result format requested from the OCR service.
    #[arg(long, env = "DOCSCAN_EXPORT_FORMAT", value_enum, default_value = "txt")]
    export_format: ExportArg,

    /// Directory for per-batch result stores.
    #[arg(long, env = "DOCSCAN_OUTPUT_DIR", default_value = "ocr_output")]
    output_dir: PathBuf,

    /// Text-layer characters below which a PDF counts as scanned.
    #[arg(long, env = "DOCSCAN_MIN_TEXT_CHARS", default_value_t = 50)]
    min_text_chars: usize,

    /// OCR PDFs even when they have a text layer.
    #[arg(long, env = "DOCSCAN_FORCE_OCR")]
    force_ocr: bool,

    /// Print the batch plan and exit. Needs no credentials.
    #[arg(long)]
    plan_only: bool,

    /// Output the full run report as JSON instead of plain text.
    #[arg(long, env = "DOCSCAN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCSCAN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ExportArg {
    Txt,
    Markdown,
    Json,
    Word,
}

impl From<ExportArg> for ExportFormat {
    fn from(v: ExportArg) -> Self {
        match v {
            ExportArg::Txt => ExportFormat::Txt,
            ExportArg::Markdown => ExportFormat::Markdown,
            ExportArg::Json => ExportFormat::Json,
            ExportArg::Word => ExportFormat::Word,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs unless -v is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plan_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn BatchProgressCallback>);

    let config = build_config(&cli, progress_cb)?;
    let capabilities = Capabilities::detect(&config);

    if cli.plan_only {
        return print_plan(&cli, &config, &capabilities).await;
    }

    // ── Cancellation on Ctrl-C ───────────────────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} interrupted, cancelling the running batch…", yellow("⚠"));
                cancel.cancel();
            }
        });
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let result = extract_with(&cli.input, &config, &capabilities, &cancel).await;
    if let Some(ref progress) = cli_progress {
        progress.clear();
    }
    let output = match result {
        Ok(output) => output,
        Err(DocScanError::Cancelled { completed }) => {
            let store = config.output_dir.display();
            eprintln!(
                "{} cancelled; {} finished batch(es) kept under {}",
                red("✘"),
                completed,
                store
            );
            std::process::exit(130);
        }
        Err(e) => return Err(e).context("Extraction failed"),
    };

    if let Some(ref output_path) = cli.output {
        write_output(output_path, &output)
            .await
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        print_summary(&cli, &output);
    }
    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .batch_enabled(!cli.no_batch)
        .threshold_pages(cli.threshold_pages)
        .threshold_size_mb(cli.threshold_size_mb)
        .batch_size(cli.batch_size as usize)
        .max_retries(cli.max_retries)
        .retry_delay_secs(cli.retry_delay)
        .check_interval_secs(cli.check_interval)
        .max_wait_secs(cli.max_wait)
        .export_format(cli.export_format.into())
        .output_dir(cli.output_dir.clone())
        .min_text_chars(cli.min_text_chars)
        .force_ocr(cli.force_ocr);

    if let (Some(app_id), Some(secret)) = (&cli.app_id, &cli.secret) {
        builder = builder.credentials(Credentials::new(app_id, secret));
    }
    if let Some(ref url) = cli.service_url {
        builder = builder.service_url(url.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--plan-only`: page count and batch ranges, no remote calls.
async fn print_plan(cli: &Cli, config: &OcrConfig, capabilities: &Capabilities) -> Result<()> {
    let engine = capabilities.require_pdf()?;
    let pages = pdf::page_count(engine, &cli.input)
        .await
        .context("Failed to read PDF")?;
    let size = tokio::fs::metadata(&cli.input)
        .await
        .context("Failed to stat input")?
        .len();
    let plan = planner::plan(pages, size, &PlannerSettings::from(config))?;

    println!("File:      {}", cli.input.display());
    println!("Pages:     {}", pages);
    println!("Size:      {:.1} MiB", size as f64 / (1024.0 * 1024.0));
    match plan {
        planner::ExecutionPlan::WholeDocument => println!("Plan:      whole document"),
        planner::ExecutionPlan::Batched(batches) => {
            println!("Plan:      {} batches", batches.len());
            for batch in &batches {
                println!("  {}", batch.marker());
            }
        }
    }
    Ok(())
}

/// Text, or JSON when the path ends in `.json`.
async fn write_output(path: &Path, output: &ExtractionOutput) -> Result<()> {
    let content = if path.extension().is_some_and(|e| e == "json") {
        serde_json::to_string_pretty(output)?
    } else {
        output.text.clone()
    };
    write_atomic(path, &content).await?;
    Ok(())
}

fn print_summary(cli: &Cli, output: &ExtractionOutput) {
    let stats = &output.stats;
    let destination = cli
        .output
        .as_ref()
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();

    eprintln!(
        "{}  {} via {:?}  {} chars  {}ms{}",
        if stats.batches_failed == 0 { green("✔") } else { cyan("⚠") },
        output.kind,
        output.method,
        stats.chars,
        stats.duration_ms,
        destination,
    );
    if let Some(job) = &output.job {
        eprintln!(
            "   {}/{} batches, {} attempts  store: {}",
            job.succeeded.len(),
            job.planned_count(),
            job.total_attempts(),
            dim(&job.store_path.display().to_string()),
        );
        if job.is_partial() {
            let failed: Vec<String> = job
                .failed
                .iter()
                .map(|f| format!("{} ({})", f.index + 1, f.range))
                .collect();
            eprintln!("   {} failed batches: {}", yellow("⚠"), failed.join(", "));
        }
    }
}
