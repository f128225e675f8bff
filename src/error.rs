//! Error types for the pdf2pdfa library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConversionError`]: **fatal**. The batch (or the file being processed)
//!   cannot proceed (missing input, unwritable output directory, engine
//!   failure with no recovery). Returned as `Err(ConversionError)` from the
//!   top-level entry points in [`crate::convert`].
//!
//! * [`EngineError`]: **per-invocation**. One external engine call failed.
//!   Each variant names the stage (conversion, extraction, merge, page
//!   count) so a caller reading the error knows *which* subprocess on
//!   *which* file went wrong. Engine errors bubble into `ConversionError`
//!   via `#[from]` once the pipeline decides they are unrecoverable.
//!
//! The split lets the partitioner and orchestrator react to individual
//! engine failures (degrade to a single-page range, clean up chunk temps)
//! without the batch-level type knowing about subprocess exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2pdfa library.
#[derive(Debug, Error)]
pub enum ConversionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Staged input file was not found at the given path.
    #[error("input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The staged file exists but is not a PDF.
    #[error("file is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// An external engine invocation failed and the pipeline cannot recover.
    #[error(transparent)]
    Engine(#[from] EngineError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write inside the session output directory.
    #[error("failed to write output '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A failure of one external engine process.
///
/// Every variant carries enough context to answer "which stage, which
/// file": the conversion engine and the page-manipulation engine are
/// separate binaries with separate failure modes, and diagnostics from a
/// failed conversion run look nothing like a failed extraction run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine binary could not be spawned at all (missing, not
    /// executable, bad path).
    #[error("failed to spawn {tool}: {source}\nCheck that '{tool}' is installed and on PATH.")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The conversion engine exited with a failure status.
    #[error("conversion failed for '{input}' ({status}): {stderr}")]
    Conversion {
        input: PathBuf,
        status: String,
        stderr: String,
    },

    /// The extraction engine exited with a failure status that did not
    /// match the recognised succeeded-with-warnings pattern.
    #[error("page extraction failed for '{input}' pages {start}-{end} ({status}): {stderr}")]
    Extraction {
        input: PathBuf,
        start: u32,
        end: u32,
        status: String,
        stderr: String,
    },

    /// Reassembly of converted chunks failed.
    #[error("merge failed producing '{output}' ({status}): {stderr}")]
    Merge {
        output: PathBuf,
        status: String,
        stderr: String,
    },

    /// The page-count query failed or produced unparseable output.
    #[error("page count failed for '{input}': {detail}")]
    PageCount { input: PathBuf, detail: String },

    /// The document has no pages; there is nothing to convert or split.
    #[error("document has no pages: '{input}'")]
    EmptyDocument { input: PathBuf },

    /// Filesystem error around an engine invocation (temp file, metadata).
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the failure happened in the extraction engine rather than
    /// the conversion engine. Lets callers distinguish "this range cannot
    /// be probed" from "this document cannot be converted".
    pub fn is_extraction(&self) -> bool {
        matches!(self, EngineError::Extraction { .. })
    }
}
