//! Final text assembly with provenance markers.
//!
//! Whole-document output is tagged `[Scanned PDF - <name>]`. Batched output is
//! one `[Batch i: pages a-b]` section per successful batch, ascending by
//! index, separated by a blank line. The in-memory and the store-backed paths
//! render identical text for the same results.

use crate::error::DocScanError;
use crate::output::{Batch, BatchResult};
use crate::pipeline::store::{ResultStore, StoredSection};
use std::path::Path;
use tracing::warn;

/// Normalise recognised text before it is stored or aggregated.
///
/// Line endings become `\n` and surrounding whitespace is trimmed, so the
/// text survives a store write and read-back unchanged.
pub fn normalise_text(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Tag a whole-document result. `None` when nothing was recognised.
pub fn aggregate_whole(document_name: &str, text: &str) -> Option<String> {
    let text = normalise_text(text);
    if text.is_empty() {
        return None;
    }
    Some(format!("[Scanned PDF - {}]\n{}", document_name, text))
}

fn render<'a>(sections: impl Iterator<Item = (String, &'a str)>) -> String {
    sections
        .map(|(marker, text)| format!("{marker}\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Aggregate in-memory results, sorted by batch index.
pub fn aggregate_results(results: &[BatchResult]) -> String {
    let mut ordered: Vec<&BatchResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.index);
    render(
        ordered
            .into_iter()
            .map(|r| (Batch::new(r.index, r.range).marker(), r.text.as_str())),
    )
}

/// Aggregate the sections persisted in a store file, in file order.
pub fn aggregate_sections(sections: &[StoredSection]) -> String {
    render(sections.iter().map(|s| (s.marker.clone(), s.text.as_str())))
}

/// Aggregate a batched job, reading the store when `results` is unavailable.
pub async fn aggregate_batched(
    results: Option<&[BatchResult]>,
    store_path: &Path,
) -> Result<String, DocScanError> {
    match results {
        Some(results) => Ok(aggregate_results(results)),
        None => {
            warn!(
                "In-memory batch results unavailable, reading {}",
                store_path.display()
            );
            let sections = ResultStore::read_sections(store_path).await?;
            Ok(aggregate_sections(&sections))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Document, PageRange};
    use chrono::Utc;

    fn result(index: usize, start: usize, end: usize, text: &str) -> BatchResult {
        BatchResult {
            index,
            range: PageRange::new(start, end),
            text: normalise_text(text),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn whole_document_tag() {
        assert_eq!(
            aggregate_whole("report.pdf", "\n  body text \r\n").unwrap(),
            "[Scanned PDF - report.pdf]\nbody text"
        );
        assert!(aggregate_whole("report.pdf", " \n ").is_none());
    }

    #[test]
    fn sections_are_ordered_and_marked() {
        let results = vec![
            result(2, 40, 50, "third"),
            result(0, 0, 20, "first"),
        ];
        assert_eq!(
            aggregate_results(&results),
            "[Batch 1: pages 1-20]\nfirst\n\n[Batch 3: pages 41-50]\nthird"
        );
    }

    #[tokio::test]
    async fn store_read_back_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::new("book.pdf", 50, 10);
        let mut store = ResultStore::create(dir.path(), &doc, 20).await.unwrap();

        let results = vec![
            result(0, 0, 20, "page one\r\nline\n\n\nafter gap"),
            result(2, 40, 50, "  last batch  "),
        ];
        for r in &results {
            let marker = Batch::new(r.index, r.range).marker();
            store.append(&marker, r).await.unwrap();
        }
        store.finish(2, 50).await.unwrap();

        let from_memory = aggregate_batched(Some(&results), store.path()).await.unwrap();
        let from_store = aggregate_batched(None, store.path()).await.unwrap();
        assert_eq!(from_memory, from_store);
        assert!(from_store.starts_with("[Batch 1: pages 1-20]\npage one\nline\n\n\nafter gap"));
    }

    #[tokio::test]
    async fn store_read_back_survives_footer_in_text() {
        use crate::pipeline::store::DELIMITER;

        let dir = tempfile::tempdir().unwrap();
        let doc = Document::new("minutes.pdf", 40, 10);
        let mut store = ResultStore::create(dir.path(), &doc, 20).await.unwrap();

        let results = vec![
            result(0, 0, 20, &format!("intro\n{DELIMITER}\nCompleted: page footer\nmore")),
            result(1, 20, 40, "second"),
        ];
        for r in &results {
            let marker = Batch::new(r.index, r.range).marker();
            store.append(&marker, r).await.unwrap();
        }

        let from_memory = aggregate_batched(Some(&results), store.path()).await.unwrap();
        let from_store = aggregate_batched(None, store.path()).await.unwrap();
        assert_eq!(from_memory, from_store);
        assert!(from_store.ends_with("[Batch 2: pages 21-40]\nsecond"));
    }
}
