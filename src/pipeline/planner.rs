//! Batch planning: whole-document call or page-range batches.
//!
//! Pure functions with no I/O, so every threshold combination can be unit
//! tested without a PDF or a network.
//!
//! Batching is chosen iff batching is enabled, the document has pages, and it
//! is either longer than `threshold_pages` or larger than the size threshold.
//! Batches are `ceil(P / batch_size)` contiguous half-open ranges covering
//! `[0, P)` exactly once.

use crate::config::OcrConfig;
use crate::error::DocScanError;
use crate::output::{Batch, PageRange};

/// The inputs the planner reads from [`OcrConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerSettings {
    pub batch_enabled: bool,
    pub threshold_pages: usize,
    pub threshold_size_bytes: f64,
    pub batch_size: usize,
}

impl From<&OcrConfig> for PlannerSettings {
    fn from(config: &OcrConfig) -> Self {
        Self {
            batch_enabled: config.batch_enabled,
            threshold_pages: config.threshold_pages,
            threshold_size_bytes: config.threshold_size_bytes(),
            batch_size: config.batch_size,
        }
    }
}

/// How a document will be sent to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// One remote call for the whole document; no batch bookkeeping.
    WholeDocument,
    /// Ordered page-range batches, all Pending.
    Batched(Vec<Batch>),
}

impl ExecutionPlan {
    pub fn is_batched(&self) -> bool {
        matches!(self, ExecutionPlan::Batched(_))
    }

    pub fn batch_count(&self) -> usize {
        match self {
            ExecutionPlan::WholeDocument => 0,
            ExecutionPlan::Batched(batches) => batches.len(),
        }
    }
}

/// True when the document must be split.
pub fn should_batch(total_pages: usize, size_bytes: u64, settings: &PlannerSettings) -> bool {
    settings.batch_enabled
        && total_pages > 0
        && (total_pages > settings.threshold_pages
            || size_bytes as f64 > settings.threshold_size_bytes)
}

/// Decide the execution plan for a document.
///
/// Fails with `InvalidPlan` when `batch_size` is zero, before anything else
/// is considered.
pub fn plan(
    total_pages: usize,
    size_bytes: u64,
    settings: &PlannerSettings,
) -> Result<ExecutionPlan, DocScanError> {
    if settings.batch_size == 0 {
        return Err(DocScanError::InvalidPlan("batch_size must be ≥ 1".into()));
    }
    if should_batch(total_pages, size_bytes, settings) {
        Ok(ExecutionPlan::Batched(plan_batches(
            total_pages,
            settings.batch_size,
        )?))
    } else {
        Ok(ExecutionPlan::WholeDocument)
    }
}

/// Split `[0, total_pages)` into `ceil(total_pages / batch_size)` batches.
pub fn plan_batches(total_pages: usize, batch_size: usize) -> Result<Vec<Batch>, DocScanError> {
    if batch_size == 0 {
        return Err(DocScanError::InvalidPlan("batch_size must be ≥ 1".into()));
    }
    let count = total_pages.div_ceil(batch_size);
    Ok((0..count)
        .map(|i| {
            let start = i * batch_size;
            let end = ((i + 1) * batch_size).min(total_pages);
            Batch::new(i, PageRange::new(start, end))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BatchStatus;

    const MB: f64 = 1024.0 * 1024.0;

    fn settings(enabled: bool, threshold_pages: usize, threshold_mb: f64, batch_size: usize) -> PlannerSettings {
        PlannerSettings {
            batch_enabled: enabled,
            threshold_pages,
            threshold_size_bytes: threshold_mb * MB,
            batch_size,
        }
    }

    #[test]
    fn batches_cover_every_page_exactly_once() {
        for total in 1..=130 {
            for size in 1..=25 {
                let batches = plan_batches(total, size).unwrap();
                assert_eq!(batches.len(), total.div_ceil(size), "P={total} B={size}");
                assert_eq!(batches[0].range.start, 0);
                assert_eq!(batches.last().unwrap().range.end, total);
                for pair in batches.windows(2) {
                    assert_eq!(pair[0].range.end, pair[1].range.start);
                }
                for (i, b) in batches.iter().enumerate() {
                    assert_eq!(b.index, i);
                    assert!(!b.range.is_empty());
                    assert!(b.range.len() <= size);
                    assert_eq!(b.status, BatchStatus::Pending);
                    assert_eq!(b.attempts, 0);
                }
            }
        }
    }

    #[test]
    fn whole_document_iff_under_both_thresholds() {
        for pages in [1usize, 30, 49, 50, 51, 200] {
            for size_mb in [0.5f64, 19.9, 20.0, 20.1, 80.0] {
                let s = settings(true, 50, 20.0, 20);
                let bytes = (size_mb * MB) as u64;
                let expected_whole = pages <= 50 && bytes as f64 <= 20.0 * MB;
                let plan = plan(pages, bytes, &s).unwrap();
                assert_eq!(!plan.is_batched(), expected_whole, "P={pages} S={size_mb}MB");
            }
        }
    }

    #[test]
    fn thirty_pages_under_fifty_is_whole_document() {
        let plan = plan(30, 1_000_000, &settings(true, 50, 20.0, 20)).unwrap();
        assert_eq!(plan, ExecutionPlan::WholeDocument);
    }

    #[test]
    fn disabled_batching_is_always_whole_document() {
        let plan = plan(10_000, u64::MAX / 2, &settings(false, 50, 20.0, 20)).unwrap();
        assert_eq!(plan, ExecutionPlan::WholeDocument);
    }

    #[test]
    fn zero_pages_is_whole_document() {
        let plan = plan(0, 500 * 1024 * 1024, &settings(true, 50, 20.0, 20)).unwrap();
        assert_eq!(plan, ExecutionPlan::WholeDocument);
    }

    #[test]
    fn size_alone_triggers_batching() {
        let plan = plan(10, 30 * 1024 * 1024, &settings(true, 50, 20.0, 4)).unwrap();
        assert_eq!(plan.batch_count(), 3);
    }

    #[test]
    fn hundred_twenty_pages_make_six_batches() {
        let plan = plan(120, 1_000, &settings(true, 50, 20.0, 20)).unwrap();
        let ExecutionPlan::Batched(batches) = plan else {
            panic!("expected batched plan");
        };
        let ranges: Vec<(usize, usize)> = batches.iter().map(|b| (b.range.start, b.range.end)).collect();
        assert_eq!(
            ranges,
            vec![(0, 20), (20, 40), (40, 60), (60, 80), (80, 100), (100, 120)]
        );
    }

    #[test]
    fn zero_batch_size_is_invalid_plan() {
        let err = plan(120, 0, &settings(true, 50, 20.0, 0)).unwrap_err();
        assert!(matches!(err, DocScanError::InvalidPlan(_)));
        assert!(plan_batches(10, 0).is_err());
    }
}
