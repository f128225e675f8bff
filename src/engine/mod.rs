//! External engine adapters.
//!
//! The crate never touches page objects itself: "convert one file to
//! PDF/A" and "extract page range N..M" are capabilities provided by two
//! external binaries, each invoked as an isolated process and wholly
//! untrusted for timing and exit-status reliability. The [`Engine`] trait
//! is the seam: the pipeline is written against it, the production
//! implementation is [`ProcessEngine`], and tests substitute deterministic
//! fakes.

pub mod process;

use crate::error::EngineError;
use crate::pipeline::partition::PageRange;
use async_trait::async_trait;
use std::path::Path;

pub use process::ProcessEngine;

/// The external-process capabilities the pipeline depends on.
///
/// Every method spawns (or models) one subprocess invocation, writes
/// exactly one output file per call, and never mutates its inputs.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Number of pages in `input`. Zero pages is reported as
    /// [`EngineError::EmptyDocument`].
    async fn count_pages(&self, input: &Path) -> Result<u32, EngineError>;

    /// Extract the inclusive 1-indexed `range` from `input` into `output`.
    async fn extract_pages(
        &self,
        input: &Path,
        range: PageRange,
        output: &Path,
    ) -> Result<(), EngineError>;

    /// Concatenate `inputs` (in the given order) into `output`.
    async fn merge(&self, inputs: &[&Path], output: &Path) -> Result<(), EngineError>;

    /// Convert `input` to the fixed archival target profile at `output`.
    ///
    /// Conversion parameters (conformance profile, color policy, quality
    /// tier) are constants of the implementation, not caller-supplied, so
    /// every output is directly comparable for conformance.
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), EngineError>;
}
