//! Pipeline stages for size-capped PDF/A conversion.
//!
//! Each submodule implements exactly one stage. Keeping stages separate
//! makes each independently testable against a fake [`crate::engine::Engine`]
//! and lets us swap implementations without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ parallel ──▶ (measure) ──▶ partition ──▶ parallel ──▶ verify
//! (path)    (chunked        │          (probe +      (per part)   (marker
//!            convert)       │           bisect)                    scan)
//!                           └─ under ceiling: verify directly
//! ```
//!
//! 1. [`parallel`]: chunk a large document, convert chunks concurrently,
//!    merge in page order, reconvert the merged intermediate
//! 2. [`partition`]: compute the minimal set of contiguous page ranges
//!    whose extractions each fit under the byte ceiling
//! 3. [`verify`]: scan a produced artifact for its declared archival
//!    conformance markers

pub mod parallel;
pub mod partition;
pub mod verify;
