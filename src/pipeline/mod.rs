//! Pipeline stages for document extraction and batched OCR.
//!
//! Each submodule implements one step. Keeping stages separate makes each
//! independently testable and lets the remote client or the splitter be
//! swapped for fakes without touching the executor.
//!
//! ## Data Flow
//!
//! ```text
//! sniff ──▶ text ─────────────────────────────────────────────▶ final text
//!   │        (plain / DOCX / PDF text layer)
//!   └──▶ planner ──▶ whole document ──▶ recognition ──▶ aggregate
//!           │
//!           └──▶ executor ──▶ split ──▶ recognition ──▶ store ──▶ aggregate
//! ```
//!
//! 1. [`sniff`]     — classify the input by magic bytes, then extension
//! 2. [`text`]      — direct extraction when no OCR is needed
//! 3. [`planner`]   — whole-document call or page-range batches (pure)
//! 4. [`split`]     — one transient sub-document per batch attempt
//! 5. [`executor`]  — sequential batches with bounded per-batch retries
//! 6. [`store`]     — append-only, synced result file
//! 7. [`aggregate`] — ordered final text with provenance markers
//!
//! [`pdf`] holds the pdfium calls shared by `text` and `split`; it runs in
//! `spawn_blocking` because pdfium is not async-safe.

pub mod aggregate;
pub mod executor;
pub mod pdf;
pub mod planner;
pub mod sniff;
pub mod split;
pub mod store;
pub mod text;
