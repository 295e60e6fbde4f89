//! Runtime capability descriptor.
//!
//! Optional capabilities (the pdfium shared library, remote OCR credentials)
//! are probed once at startup by [`Capabilities::detect`] and the resulting
//! value is handed to every component that needs them. Nothing consults
//! process-wide flags after that point, so tests can construct any
//! combination directly with [`Capabilities::new`].

use crate::config::{Credentials, OcrConfig};
use crate::error::DocScanError;
use pdfium_render::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Where the pdfium shared library is loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PdfLibrary {
    /// A directory or file named by `PDFIUM_LIB_PATH`.
    Path(PathBuf),
    /// The platform's default library search path.
    System,
}

/// A pdfium library that was successfully bound during detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfEngine {
    library: PdfLibrary,
}

impl PdfEngine {
    pub fn new(library: PdfLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &PdfLibrary {
        &self.library
    }

    /// Bind a fresh [`Pdfium`] instance. Call from blocking contexts only.
    pub fn bind(&self) -> Result<Pdfium, DocScanError> {
        bind_library(&self.library)
            .map(Pdfium::new)
            .map_err(|e| DocScanError::CapabilityUnavailable {
                capability: "pdf".into(),
                hint: format!("pdfium could not be bound: {e:?}"),
            })
    }

    /// Probe `PDFIUM_LIB_PATH`, then the system library.
    fn probe() -> Option<Self> {
        if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
            if !path.is_empty() {
                let library = PdfLibrary::Path(PathBuf::from(path));
                match bind_library(&library) {
                    Ok(_) => return Some(Self { library }),
                    Err(e) => warn!("PDFIUM_LIB_PATH is set but pdfium failed to load: {:?}", e),
                }
            }
        }
        match bind_library(&PdfLibrary::System) {
            Ok(_) => Some(Self {
                library: PdfLibrary::System,
            }),
            Err(_) => None,
        }
    }
}

fn bind_library(library: &PdfLibrary) -> Result<Box<dyn PdfiumLibraryBindings>, PdfiumError> {
    match library {
        PdfLibrary::Path(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        PdfLibrary::Path(path) => Pdfium::bind_to_library(path),
        PdfLibrary::System => Pdfium::bind_to_system_library(),
    }
}

/// Capabilities available to this process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Capabilities {
    /// PDF page counting, splitting and text-layer extraction.
    pub pdf_engine: Option<PdfEngine>,
    /// Credentials for the remote OCR service are present.
    pub remote_ocr: bool,
}

impl Capabilities {
    pub fn new(pdf_engine: Option<PdfEngine>, remote_ocr: bool) -> Self {
        Self {
            pdf_engine,
            remote_ocr,
        }
    }

    /// Probe the runtime once. Logs what is available and what is not.
    pub fn detect(config: &OcrConfig) -> Self {
        let pdf_engine = PdfEngine::probe();
        let remote_ocr = config.credentials.is_some() || Credentials::from_env().is_some();

        match &pdf_engine {
            Some(engine) => info!("PDF support: pdfium ({:?})", engine.library()),
            None => warn!("PDF support unavailable: pdfium library not found"),
        }
        if remote_ocr {
            info!("Remote OCR support: credentials configured");
        } else {
            warn!("Remote OCR unavailable: set XUNFEI_APP_ID and XUNFEI_SECRET");
        }

        Self {
            pdf_engine,
            remote_ocr,
        }
    }

    /// The PDF engine, or a `CapabilityUnavailable` error with a setup hint.
    pub fn require_pdf(&self) -> Result<&PdfEngine, DocScanError> {
        self.pdf_engine
            .as_ref()
            .ok_or_else(|| DocScanError::CapabilityUnavailable {
                capability: "pdf".into(),
                hint: "Install libpdfium or set PDFIUM_LIB_PATH=/path/to/libpdfium.".into(),
            })
    }

    /// Fail unless remote OCR credentials are configured.
    pub fn require_remote_ocr(&self) -> Result<(), DocScanError> {
        if self.remote_ocr {
            Ok(())
        } else {
            Err(DocScanError::CapabilityUnavailable {
                capability: "remote-ocr".into(),
                hint: "Set XUNFEI_APP_ID and XUNFEI_SECRET, or pass --app-id/--secret.".into(),
            })
        }
    }
}
