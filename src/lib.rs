//! # pdf2pdfa
//!
//! Convert PDF documents to size-capped PDF/A artifacts.
//!
//! ## Why this crate?
//!
//! Archival intake systems commonly enforce two constraints at once: every
//! document must declare a PDF/A conformance level, and no single file may
//! exceed a hard byte ceiling. Converting is easy; converting *and*
//! guaranteeing the ceiling is not, because compression is content-dependent
//! and the only way to know a range's converted size is to produce it. This
//! crate wraps the two external engines that do the page work and adds what
//! they don't have: a probing partitioner that finds minimal page ranges
//! fitting under the ceiling, a chunk-parallel orchestrator for large
//! documents, and replayable progress sessions for callers that stream
//! status to end users.
//!
//! ## Pipeline Overview
//!
//! ```text
//! staged PDF
//!  │
//!  ├─ 1. Convert   whole document → PDF/A (chunk-parallel when large)
//!  ├─ 2. Measure   output ≤ ceiling? then verify and finish
//!  ├─ 3. Partition probe + binary-search page ranges that fit
//!  ├─ 4. Convert   each range independently (again chunk-parallel)
//!  ├─ 5. Verify    scan declared conformance markers per artifact
//!  └─ 6. Report    results + log lines through the progress session
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2pdfa::{convert_batch, ConversionConfig, ProcessEngine, SourceFile};
//! use pdf2pdfa::session::{SessionRegistry, SessionSink};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let engine = ProcessEngine::new(config.gs_path.as_deref(), config.qpdf_path.as_deref());
//!
//!     let registry = SessionRegistry::new(config.session_grace);
//!     let session = registry.create_session();
//!     let sink = SessionSink::new(&registry, session);
//!
//!     let files = vec![SourceFile::new("/tmp/staged/upload-01.pdf", "report.pdf")];
//!     let summary = convert_batch(
//!         &engine,
//!         &files,
//!         Path::new("/var/lib/pdf2pdfa/sessions/abc"),
//!         &config,
//!         &sink,
//!     )
//!     .await?;
//!     registry.mark_done(session)?;
//!
//!     println!("{} files, {} bytes", summary.files.len(), summary.total_output_bytes);
//!     Ok(())
//! }
//! ```
//!
//! External engine binaries (`gs`, `qpdf`) are resolved from the
//! configuration, the `PDF2PDFA_GS` / `PDF2PDFA_QPDF` environment
//! variables, or PATH; see [`ProcessEngine`]. Everything above the
//! engines is written against the [`engine::Engine`] trait, so tests run
//! without either binary installed.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod sweeper;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DEFAULT_CEILING_BYTES};
pub use convert::{convert_batch, inspect, SourceFile};
pub use engine::{Engine, ProcessEngine};
pub use error::{ConversionError, EngineError};
pub use output::{BatchSummary, Conformance, ConvertedFileResult, DocumentInfo, PartDetail};
pub use pipeline::partition::{PageRange, PlannedRange};
pub use progress::{NoopSink, ProgressEvent, ProgressSink};
pub use session::{SessionError, SessionId, SessionRegistry, SessionSink};
