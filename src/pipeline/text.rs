//! Direct text extraction for documents that do not need OCR.
//!
//! Plain text, DOCX, and the embedded text layer of PDFs. A PDF whose text
//! layer is shorter than `min_text_chars` is reported as [`PdfText::Scanned`]
//! so the caller can route it to remote OCR.

use crate::capabilities::PdfEngine;
use crate::error::DocScanError;
use crate::pipeline::pdf;
use encoding_rs::{Encoding, GBK, WINDOWS_1252};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Prefix identifying text that came out of a DOCX container.
pub const DOCX_PREFIX: &str = "[DOCX document]";

/// Outcome of reading a PDF's embedded text layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfText {
    /// Usable, cleaned text.
    Text(String),
    /// Too little text to be a born-digital PDF.
    Scanned { chars: usize },
}

// ── Plain text ───────────────────────────────────────────────────────────────

/// Decode bytes trying UTF-8, GBK, then Windows-1252.
///
/// The first encoding that decodes without errors and yields non-blank text
/// wins. Returns the trimmed text and the encoding used.
pub fn decode_text_bytes(bytes: &[u8]) -> Option<(String, &'static str)> {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);

    if let Ok(s) = std::str::from_utf8(bytes) {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            return Some((trimmed.to_string(), "UTF-8"));
        }
    }

    for encoding in [GBK, WINDOWS_1252] {
        if let Some(text) = decode_strict(encoding, bytes) {
            return Some((text, encoding.name()));
        }
    }
    None
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let decoded = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Read and decode a plain-text file.
pub async fn extract_plain_text(path: &Path) -> Result<String, DocScanError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocScanError::Internal(format!("Cannot read {}: {}", path.display(), e)))?;

    match decode_text_bytes(&bytes) {
        Some((text, encoding)) => {
            info!("Read {} as {} ({} chars)", path.display(), encoding, text.chars().count());
            Ok(text)
        }
        None => Err(DocScanError::NoTextExtracted {
            path: path.to_path_buf(),
            reason: "file is empty or not valid text in any supported encoding".into(),
        }),
    }
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").unwrap());

static RE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(tab|br|cr)\s*/>").unwrap());

/// Paragraph texts of a `word/document.xml` body, empty paragraphs dropped.
pub fn docx_paragraphs(document_xml: &str) -> Vec<String> {
    RE_PARAGRAPH
        .find_iter(document_xml)
        .filter_map(|para| {
            let mut text = String::new();
            for cap in RE_RUN.captures_iter(para.as_str()) {
                match (cap.get(1), cap.get(2).map(|m| m.as_str())) {
                    (Some(run), _) => text.push_str(&unescape_xml(run.as_str())),
                    (None, Some("tab")) => text.push('\t'),
                    (None, Some(_)) => text.push('\n'),
                    (None, None) => {}
                }
            }
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .collect()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Extract the paragraphs of a DOCX file, joined by blank lines.
pub async fn extract_docx(path: &Path) -> Result<String, DocScanError> {
    let owned = path.to_path_buf();
    let xml = tokio::task::spawn_blocking(move || read_document_xml(&owned))
        .await
        .map_err(|e| DocScanError::Internal(format!("DOCX task panicked: {}", e)))??;

    let paragraphs = docx_paragraphs(&xml);
    if paragraphs.is_empty() {
        return Err(DocScanError::NoTextExtracted {
            path: path.to_path_buf(),
            reason: "the document has no text paragraphs".into(),
        });
    }
    info!("Read {} DOCX paragraphs from {}", paragraphs.len(), path.display());
    Ok(format!("{}\n{}", DOCX_PREFIX, paragraphs.join("\n\n")))
}

fn read_document_xml(path: &Path) -> Result<String, DocScanError> {
    let corrupt = |detail: String| DocScanError::CorruptDocument {
        path: path.to_path_buf(),
        detail,
    };
    let file = std::fs::File::open(path)
        .map_err(|e| DocScanError::Internal(format!("Cannot open {}: {}", path.display(), e)))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| corrupt(format!("not a DOCX (zip) container: {e}")))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| corrupt(format!("missing word/document.xml: {e}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| corrupt(format!("unreadable word/document.xml: {e}")))?;
    Ok(xml)
}

// ── PDF text layer ───────────────────────────────────────────────────────────

static RE_LOWER_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());
static RE_ACRONYM_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z]{2,})([A-Z][a-z])").unwrap());
static RE_DIGIT_ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)([A-Za-z])").unwrap());
static RE_ALPHA_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z])(\d)").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Re-insert word boundaries lost by text-layer extraction, then collapse
/// whitespace.
pub fn clean_pdf_text(raw: &str) -> String {
    let s = RE_LOWER_UPPER.replace_all(raw, "$1 $2");
    let s = RE_ACRONYM_WORD.replace_all(&s, "$1 $2");
    let s = RE_DIGIT_ALPHA.replace_all(&s, "$1 $2");
    let s = RE_ALPHA_DIGIT.replace_all(&s, "$1 $2");
    RE_WHITESPACE.replace_all(&s, " ").trim().to_string()
}

/// Classify an already-extracted text layer.
pub fn classify_text_layer(raw: &str, min_text_chars: usize) -> PdfText {
    let chars = raw.trim().chars().count();
    if chars < min_text_chars {
        PdfText::Scanned { chars }
    } else {
        PdfText::Text(clean_pdf_text(raw))
    }
}

/// Read and classify the text layer of a PDF.
pub async fn extract_pdf_text(
    engine: &PdfEngine,
    path: &Path,
    min_text_chars: usize,
) -> Result<PdfText, DocScanError> {
    let raw = pdf::text_layer(engine, path).await?;
    let result = classify_text_layer(&raw, min_text_chars);
    if let PdfText::Scanned { chars } = &result {
        debug!(
            "{}: text layer has {} chars (< {}), treating as scanned",
            path.display(),
            chars,
            min_text_chars
        );
    }
    Ok(result)
}
