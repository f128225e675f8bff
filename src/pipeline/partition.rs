//! Size-fitting partitioner: split a document into the minimal ordered set
//! of contiguous page ranges whose extractions each fit under a byte
//! ceiling.
//!
//! ## Why probe + binary search?
//!
//! Every probe is an external-process extraction, by far the dominant
//! cost. A naive page-by-page scan is O(P) probes; the two-phase strategy
//! here ("try the full remainder first, else bisect the end page") needs
//! one probe per range in the common single-range case and O(log P) probes
//! per emitted range otherwise.
//!
//! Extracted size is the fitting proxy: per-range conversion output tracks
//! the extracted range closely enough for planning, and the controller
//! independently re-checks every final part against the ceiling.

use crate::engine::Engine;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// An inclusive, 1-indexed span of pages within a document.
///
/// Ranges covering a document are contiguous, non-overlapping, and have
/// ascending start values; `start <= end <= total_pages` always holds for
/// planner output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start >= 1 && start <= end);
        Self { start, end }
    }

    /// Number of pages in the range.
    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One entry of a partition plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRange {
    pub range: PageRange,
    /// True when this is a single page whose minimal extraction already
    /// exceeds the ceiling. The page is still produced: flagged, never
    /// silently dropped.
    pub over_ceiling: bool,
}

/// Compute an ordered partition of `document` such that each range's
/// extraction is expected to fit under `ceiling_bytes`.
///
/// The returned ranges are exhaustive, contiguous, non-overlapping, and
/// ascending: their concatenation reconstructs `1..=total_pages` exactly
/// once. A document whose every page individually exceeds the ceiling
/// degrades to one flagged range per page.
///
/// # Errors
/// Propagates [`EngineError`] from the page count query or any probe
/// extraction (including [`EngineError::EmptyDocument`] for zero-page
/// input).
pub async fn partition<E: Engine + ?Sized>(
    engine: &E,
    document: &Path,
    ceiling_bytes: u64,
) -> Result<Vec<PlannedRange>, EngineError> {
    let total = engine.count_pages(document).await?;

    // A one-page document cannot be split further.
    if total == 1 {
        return Ok(vec![PlannedRange {
            range: PageRange::new(1, 1),
            over_ceiling: false,
        }]);
    }

    let probe_dir = tempfile::tempdir()?;
    let mut probes = 0usize;
    let mut ranges: Vec<PlannedRange> = Vec::new();
    let mut current = 1u32;

    while current <= total {
        // Phase 1: the whole remainder might already fit.
        let remainder = PageRange::new(current, total);
        let size = probe(engine, document, remainder, probe_dir.path(), &mut probes).await?;
        if size <= ceiling_bytes {
            ranges.push(PlannedRange {
                range: remainder,
                over_ceiling: false,
            });
            break;
        }

        // Phase 2: bisect the candidate end page over current..total-1,
        // keeping the maximal end whose extraction fits.
        let mut lo = current;
        let mut hi = total - 1;
        let mut best: Option<u32> = None;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let candidate = PageRange::new(current, mid);
            let size = probe(engine, document, candidate, probe_dir.path(), &mut probes).await?;
            if size <= ceiling_bytes {
                best = Some(mid);
                lo = mid + 1;
            } else if mid == current {
                break;
            } else {
                hi = mid - 1;
            }
        }

        match best {
            Some(end) => {
                ranges.push(PlannedRange {
                    range: PageRange::new(current, end),
                    over_ceiling: false,
                });
                current = end + 1;
            }
            None => {
                // Even the single page at `current` exceeds the ceiling.
                // Emit it alone rather than looping forever.
                warn!(
                    "page {} of {} alone exceeds the {} byte ceiling",
                    current,
                    document.display(),
                    ceiling_bytes
                );
                ranges.push(PlannedRange {
                    range: PageRange::new(current, current),
                    over_ceiling: true,
                });
                current += 1;
            }
        }
    }

    debug!(
        "partitioned {} into {} ranges using {} probe extractions",
        document.display(),
        ranges.len(),
        probes
    );
    Ok(ranges)
}

/// Extract `range` to a throwaway file, measure it, delete it.
async fn probe<E: Engine + ?Sized>(
    engine: &E,
    document: &Path,
    range: PageRange,
    probe_dir: &Path,
    probes: &mut usize,
) -> Result<u64, EngineError> {
    *probes += 1;
    let path = probe_dir.join(format!("probe_{}_{}.pdf", range.start, range.end));
    engine.extract_pages(document, range, &path).await?;
    let size = tokio::fs::metadata(&path).await?.len();
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("failed to delete probe file {}: {e}", path.display());
    }
    Ok(size)
}

/// Divide `1..=total_pages` into at most `workers` contiguous, roughly
/// equal spans for chunk-parallel conversion.
///
/// When there are fewer pages than workers, each page becomes its own
/// chunk. The spans are ascending and cover every page exactly once.
pub fn split_even(total_pages: u32, workers: usize) -> Vec<PageRange> {
    let workers = (workers.max(1) as u32).min(total_pages.max(1));
    let base = total_pages / workers;
    let remainder = total_pages % workers;

    let mut chunks = Vec::with_capacity(workers as usize);
    let mut start = 1u32;
    for i in 0..workers {
        let span = base + u32::from(i < remainder);
        if span == 0 {
            continue;
        }
        let end = start + span - 1;
        chunks.push(PageRange::new(start, end));
        start = end + 1;
    }
    chunks
}
