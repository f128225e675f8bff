//! Configuration types for PDF-to-PDF/A conversion.
//!
//! All pipeline behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across tasks, log them, and diff two
//! runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ConversionError;
use std::path::PathBuf;
use std::time::Duration;

/// Default hard ceiling for any single output artifact, in bytes.
pub const DEFAULT_CEILING_BYTES: u64 = 9 * 1024 * 1024;

/// Configuration for a conversion batch.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2pdfa::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .ceiling_bytes(5 * 1024 * 1024)
///     .workers(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Hard byte ceiling for every produced artifact. Default: 9 MiB.
    ///
    /// Any converted document measuring above this is partitioned into page
    /// ranges until each part fits. The only accepted violation is a single
    /// page whose minimal extraction already exceeds the ceiling; such a
    /// part is produced anyway and flagged, never silently dropped.
    pub ceiling_bytes: u64,

    /// Number of concurrently running engine processes when one document is
    /// chunk-parallelised. Default: host CPU count.
    ///
    /// External engine processes are CPU-bound; running more of them than
    /// there are cores buys nothing and multiplies peak disk usage, since
    /// every in-flight chunk holds an extracted and a converted temporary.
    pub workers: usize,

    /// Minimum page count before a document is chunk-parallelised.
    /// Default: 10.
    ///
    /// Below the threshold the per-process spawn overhead dominates and
    /// the extra merge + reconvert passes cost more than they save, so
    /// small documents take the single-pass path.
    pub parallel_page_threshold: u32,

    /// How long finished sessions remain subscribable after
    /// [`crate::session::SessionRegistry::mark_done`]. Default: 60 s.
    ///
    /// Bounds broadcaster memory regardless of whether clients reconnect.
    pub session_grace: Duration,

    /// Age after which the retention sweeper deletes on-disk artifacts.
    /// Default: 1 hour.
    ///
    /// Must comfortably exceed the longest plausible conversion: the
    /// sweeper's only protection against racing an in-flight session is
    /// this same age check.
    pub retention: Duration,

    /// Override path for the conversion engine binary. `None` resolves via
    /// the `PDF2PDFA_GS` environment variable, then `gs` on PATH.
    pub gs_path: Option<PathBuf>,

    /// Override path for the page-manipulation engine binary. `None`
    /// resolves via `PDF2PDFA_QPDF`, then `qpdf` on PATH.
    pub qpdf_path: Option<PathBuf>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: DEFAULT_CEILING_BYTES,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            parallel_page_threshold: 10,
            session_grace: Duration::from_secs(60),
            retention: Duration::from_secs(3600),
            gs_path: None,
            qpdf_path: None,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn ceiling_bytes(mut self, bytes: u64) -> Self {
        self.config.ceiling_bytes = bytes;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn parallel_page_threshold(mut self, pages: u32) -> Self {
        self.config.parallel_page_threshold = pages;
        self
    }

    pub fn session_grace(mut self, grace: Duration) -> Self {
        self.config.session_grace = grace;
        self
    }

    pub fn retention(mut self, window: Duration) -> Self {
        self.config.retention = window;
        self
    }

    pub fn gs_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.gs_path = Some(path.into());
        self
    }

    pub fn qpdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.qpdf_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConversionError> {
        let c = &self.config;
        if c.ceiling_bytes < 1024 {
            return Err(ConversionError::InvalidConfig(format!(
                "ceiling must be at least 1 KiB, got {} bytes",
                c.ceiling_bytes
            )));
        }
        if c.workers == 0 {
            return Err(ConversionError::InvalidConfig(
                "workers must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
