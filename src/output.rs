//! Result types produced by the conversion pipeline.
//!
//! One [`ConvertedFileResult`] is produced per source file and is immutable
//! once appended to a session's result set. The batch-level totals travel
//! in [`BatchSummary`], which is the payload of the terminal
//! [`crate::progress::ProgressEvent::Result`] event.

use serde::{Deserialize, Serialize};

/// Conformance verdict for one produced artifact.
///
/// `label` is the declared archival level assembled from the document's
/// metadata markers (e.g. `"pdfa-2b"`); `None` when no marker was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conformance {
    pub compliant: bool,
    pub label: Option<String>,
}

impl Conformance {
    /// The verdict for an artifact declaring no conformance marker at all.
    pub fn none() -> Self {
        Self {
            compliant: false,
            label: None,
        }
    }
}

/// Detail for one part of a split output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartDetail {
    /// Output filename of this part (not a full path).
    pub name: String,
    /// Byte size of this part on disk.
    pub bytes: u64,
    /// Whether this part verified as declaring the target conformance.
    pub verified: bool,
    /// Declared conformance label, when present.
    pub conformance: Option<String>,
    /// True for the accepted pathological case: a single page whose
    /// minimal extraction already exceeds the ceiling.
    pub over_ceiling: bool,
}

/// The per-file outcome of a conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedFileResult {
    /// Original filename as supplied at intake.
    pub original_name: String,
    /// Output filename, or the base name when the output was split.
    pub output_name: String,
    /// Total bytes across all produced parts.
    pub total_bytes: u64,
    /// Whether the output had to be partitioned to respect the ceiling.
    pub was_split: bool,
    /// Number of produced parts (1 when not split).
    pub part_count: usize,
    /// Aggregate verification flag: true only when every part verified.
    pub verified: bool,
    /// Declared conformance label of the output (of the first part when
    /// split; parts are converted identically so labels agree).
    pub conformance: Option<String>,
    /// Per-part detail; empty when the output was not split.
    pub parts: Vec<PartDetail>,
}

/// Batch-level totals published with the terminal result event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub files: Vec<ConvertedFileResult>,
    /// Sum of `total_bytes` across all files.
    pub total_output_bytes: u64,
    /// Wall-clock duration of the whole batch.
    pub duration_ms: u64,
}

/// Page count and on-disk size of a staged document, without converting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: u32,
    pub file_bytes: u64,
}
