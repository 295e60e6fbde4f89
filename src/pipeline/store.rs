//! Append-only, human-readable store of per-batch OCR results.
//!
//! ## File layout
//!
//! ```text
//! OCR batch results
//! Source: report.pdf
//! Total pages: 120
//! Batch size: 20
//! Started: 2026-10-17T09:12:44Z
//!
//! ============================================================
//! [Batch 1: pages 1-20]
//! ============================================================
//! …text of batch 1…
//!
//! ============================================================
//! [Batch 2: pages 21-40]
//! ============================================================
//! …
//!
//! ============================================================
//! Completed: 6 successful batches, 120 total pages
//! ```
//!
//! One file per job at `<output_dir>/<stem>_ocr_batches.txt`. Creating a store
//! truncates any file left by an earlier run of the same document. Each
//! section is written with a single `write_all`, then flushed and synced
//! before [`ResultStore::append`] returns, so a crash after batch `i` leaves
//! exactly the sections of the batches that succeeded up to `i`. The
//! completion banner is written only when the job finishes.

use crate::error::DocScanError;
use crate::output::{BatchResult, Document};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Delimiter line bounding each section header.
pub const DELIMITER: &str = "============================================================";

static RE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[Batch \d+: pages \d+-\d+\]$").unwrap());

static RE_BANNER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Completed: \d+ successful batches, \d+ total pages$").unwrap());

/// One section read back from a store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSection {
    pub marker: String,
    pub text: String,
}

/// Render a section exactly as it is written to disk.
pub fn render_section(marker: &str, text: &str) -> String {
    format!("{DELIMITER}\n{marker}\n{DELIMITER}\n{text}\n\n")
}

/// Incremental result store for one job.
#[derive(Debug)]
pub struct ResultStore {
    path: PathBuf,
    file: File,
    sections: usize,
}

impl ResultStore {
    /// Store path for `document` under `output_dir`.
    pub fn path_for(output_dir: &Path, document: &Document) -> PathBuf {
        output_dir.join(format!("{}_ocr_batches.txt", document.stem()))
    }

    /// Start a fresh store, discarding any earlier one for the same document.
    pub async fn create(
        output_dir: &Path,
        document: &Document,
        batch_size: usize,
    ) -> Result<Self, DocScanError> {
        let path = Self::path_for(output_dir, document);
        let write_err = |source| DocScanError::StoreWrite {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(output_dir).await.map_err(write_err)?;

        let mut file = File::create(&path).await.map_err(write_err)?;
        let header = format!(
            "OCR batch results\nSource: {}\nTotal pages: {}\nBatch size: {}\nStarted: {}\n\n",
            document.name(),
            document.page_count,
            batch_size,
            Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        );
        file.write_all(header.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(write_err)?;

        debug!("Result store created: {}", path.display());
        Ok(Self {
            path,
            file,
            sections: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sections appended so far.
    pub fn len(&self) -> usize {
        self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections == 0
    }

    /// Append one successful batch and make it durable before returning.
    pub async fn append(&mut self, marker: &str, result: &BatchResult) -> Result<(), DocScanError> {
        let section = render_section(marker, &result.text);
        self.write_durably(&section).await?;
        self.sections += 1;
        debug!(batch = result.index + 1, "Batch result persisted");
        Ok(())
    }

    /// Write the completion banner. Not called for cancelled jobs.
    pub async fn finish(&mut self, succeeded: usize, total_pages: usize) -> Result<(), DocScanError> {
        let banner = format!(
            "{DELIMITER}\nCompleted: {succeeded} successful batches, {total_pages} total pages\n"
        );
        self.write_durably(&banner).await
    }

    async fn write_durably(&mut self, content: &str) -> Result<(), DocScanError> {
        let path = &self.path;
        let write_err = |source| DocScanError::StoreWrite {
            path: path.clone(),
            source,
        };
        self.file.write_all(content.as_bytes()).await.map_err(write_err)?;
        self.file.flush().await.map_err(write_err)?;
        self.file.sync_data().await.map_err(write_err)
    }

    /// Read every section of a store file, in file order.
    pub async fn read_sections(path: &Path) -> Result<Vec<StoredSection>, DocScanError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocScanError::Internal(format!(
                "Cannot read result store {}: {}",
                path.display(),
                e
            )))?;
        Ok(parse_sections(&content))
    }

    /// True if the store carries a completion banner.
    pub async fn is_complete(path: &Path) -> Result<bool, DocScanError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocScanError::Internal(format!(
                "Cannot read result store {}: {}",
                path.display(),
                e
            )))?;
        let lines: Vec<&str> = content.split('\n').collect();
        Ok((0..lines.len()).any(|i| is_banner(&lines, i)))
    }
}

/// True if `lines[i..]` is the completion banner closing the file.
///
/// Sections always end with a blank line while the banner ends the file
/// with a single newline, so banner-like lines inside recognised text are
/// never mistaken for it.
fn is_banner(lines: &[&str], i: usize) -> bool {
    lines.len() == i + 3
        && lines[i] == DELIMITER
        && RE_BANNER.is_match(lines[i + 1])
        && lines[i + 2].is_empty()
}

/// Parse store content into sections, ignoring the header and the banner.
pub fn parse_sections(content: &str) -> Vec<StoredSection> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line == DELIMITER {
            let next = lines.get(i + 1).copied().unwrap_or("");
            let after = lines.get(i + 2).copied().unwrap_or("");
            if RE_MARKER.is_match(next) && after == DELIMITER {
                if let Some((marker, body)) = current.take() {
                    sections.push(finish_section(marker, &body));
                }
                current = Some((next.to_string(), Vec::new()));
                i += 3;
                continue;
            }
            if is_banner(&lines, i) {
                break;
            }
        }
        if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
        i += 1;
    }
    if let Some((marker, body)) = current.take() {
        sections.push(finish_section(marker, &body));
    }
    sections
}

fn finish_section(marker: String, body: &[&str]) -> StoredSection {
    StoredSection {
        marker,
        text: body.join("\n").trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Batch, PageRange};

    fn result(index: usize, start: usize, end: usize, text: &str) -> (String, BatchResult) {
        let batch = Batch::new(index, PageRange::new(start, end));
        (
            batch.marker(),
            BatchResult {
                index,
                range: batch.range,
                text: text.to_string(),
                completed_at: Utc::now(),
            },
        )
    }

    #[tokio::test]
    async fn layout_header_sections_banner() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::new("/in/report.pdf", 40, 1_000);
        let mut store = ResultStore::create(dir.path(), &doc, 20).await.unwrap();
        assert_eq!(store.path(), dir.path().join("report_ocr_batches.txt"));

        let (m1, r1) = result(0, 0, 20, "first batch\nline two");
        store.append(&m1, &r1).await.unwrap();
        assert!(!ResultStore::is_complete(store.path()).await.unwrap());

        let (m2, r2) = result(1, 20, 40, "second batch");
        store.append(&m2, &r2).await.unwrap();
        store.finish(2, 40).await.unwrap();

        let content = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(content.starts_with("OCR batch results\nSource: report.pdf\nTotal pages: 40\nBatch size: 20\n"));
        assert!(content.contains("[Batch 1: pages 1-20]"));
        assert!(content.ends_with("Completed: 2 successful batches, 40 total pages\n"));
        assert!(ResultStore::is_complete(store.path()).await.unwrap());

        let sections = parse_sections(&content);
        assert_eq!(
            sections,
            vec![
                StoredSection {
                    marker: "[Batch 1: pages 1-20]".into(),
                    text: "first batch\nline two".into()
                },
                StoredSection {
                    marker: "[Batch 2: pages 21-40]".into(),
                    text: "second batch".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn each_append_is_readable_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::new("scan.pdf", 60, 1_000);
        let mut store = ResultStore::create(dir.path(), &doc, 20).await.unwrap();

        for i in 0..3 {
            let (marker, r) = result(i, i * 20, (i + 1) * 20, &format!("text {i}"));
            store.append(&marker, &r).await.unwrap();
            let sections = ResultStore::read_sections(store.path()).await.unwrap();
            assert_eq!(sections.len(), i + 1);
            assert_eq!(sections[i].text, format!("text {i}"));
        }
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn create_discards_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::new("scan.pdf", 20, 1_000);
        let mut first = ResultStore::create(dir.path(), &doc, 20).await.unwrap();
        let (m, r) = result(0, 0, 20, "stale");
        first.append(&m, &r).await.unwrap();
        drop(first);

        let second = ResultStore::create(dir.path(), &doc, 20).await.unwrap();
        assert!(second.is_empty());
        let sections = ResultStore::read_sections(second.path()).await.unwrap();
        assert!(sections.is_empty());
    }

    #[test]
    fn delimiter_lines_inside_text_do_not_split_sections() {
        let content = format!(
            "header\n\n{}{}",
            render_section("[Batch 1: pages 1-2]", &format!("a\n{DELIMITER}\nb")),
            render_section("[Batch 2: pages 3-4]", "c"),
        );
        let sections = parse_sections(&content);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].text, format!("a\n{DELIMITER}\nb"));
    }

    #[tokio::test]
    async fn banner_lookalike_inside_text_keeps_later_sections() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::new("minutes.pdf", 40, 1_000);
        let mut store = ResultStore::create(dir.path(), &doc, 20).await.unwrap();

        let footer = format!(
            "intro\n{DELIMITER}\nCompleted: 3 successful batches, 12 total pages"
        );
        let (m1, r1) = result(0, 0, 20, &footer);
        store.append(&m1, &r1).await.unwrap();

        // Still running: the footer must not read as a finished job.
        assert!(!ResultStore::is_complete(store.path()).await.unwrap());

        let (m2, r2) = result(1, 20, 40, "second");
        store.append(&m2, &r2).await.unwrap();
        let sections = ResultStore::read_sections(store.path()).await.unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].text, footer);
        assert_eq!(sections[1].text, "second");

        store.finish(2, 40).await.unwrap();
        assert!(ResultStore::is_complete(store.path()).await.unwrap());
        assert_eq!(ResultStore::read_sections(store.path()).await.unwrap().len(), 2);
    }

    #[test]
    fn free_form_completed_line_is_not_a_banner() {
        let content = format!(
            "header\n\n{}{}",
            render_section(
                "[Batch 1: pages 1-2]",
                &format!("intro\n{DELIMITER}\nCompleted: page footer\nmore")
            ),
            render_section("[Batch 2: pages 3-4]", "second"),
        );
        let sections = parse_sections(&content);
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections[0].text,
            format!("intro\n{DELIMITER}\nCompleted: page footer\nmore")
        );
    }
}
