//! File-kind detection: magic bytes first, file extension second.
//!
//! `infer` recognises binary containers (PDF, ZIP/OOXML, images) from their
//! leading bytes. Plain text has no signature, so anything `infer` cannot
//! place falls through to the extension table.

use crate::error::DocScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Bytes read from the head of a file for signature matching.
const SNIFF_LEN: usize = 8192;

/// Broad category of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Text,
    Pdf,
    Docx,
    Image,
    Unknown,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Text => "text",
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Image => "image",
            FileKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the kind of the file at `path`.
///
/// Fails with `FileNotFound` / `PermissionDenied` before looking at content.
pub fn detect(path: &Path) -> Result<FileKind, DocScanError> {
    if !path.exists() {
        return Err(DocScanError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    match std::fs::File::open(path) {
        Ok(f) => {
            f.take(SNIFF_LEN as u64)
                .read_to_end(&mut head)
                .map_err(|e| DocScanError::Internal(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                )))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocScanError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(DocScanError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let by_ext = kind_from_extension(path);
    let kind = match kind_from_magic(&head) {
        // OOXML is a ZIP; infer only names it docx when it can see the entry
        // names in the first bytes, so trust the extension for bare ZIPs.
        Some(FileKind::Unknown) if by_ext == FileKind::Docx => FileKind::Docx,
        Some(kind) => kind,
        None => by_ext,
    };
    debug!("Detected {} as {}", path.display(), kind);
    Ok(kind)
}

/// Classify by signature. `None` means no signature matched.
pub fn kind_from_magic(head: &[u8]) -> Option<FileKind> {
    let found = infer::get(head)?;
    let kind = match found.mime_type() {
        "application/pdf" => FileKind::Pdf,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/msword" => FileKind::Docx,
        "text/html" | "text/xml" | "application/xml" => FileKind::Text,
        mime if mime.starts_with("image/") => FileKind::Image,
        _ => FileKind::Unknown,
    };
    Some(kind)
}

/// Classify by extension, case-insensitively.
pub fn kind_from_extension(path: &Path) -> FileKind {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" | "html" | "htm" | "xml" | "csv" | "log" => FileKind::Text,
        "pdf" => FileKind::Pdf,
        "docx" | "doc" => FileKind::Docx,
        "jpg" | "jpeg" | "png" | "tiff" | "tif" | "bmp" | "gif" => FileKind::Image,
        _ => FileKind::Unknown,
    }
}
