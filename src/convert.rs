//! Batch conversion entry points: the pipeline controller.
//!
//! Per staged file, strictly sequential: convert the whole document →
//! measure → if over the ceiling, partition into page ranges and convert
//! each range independently → verify every produced artifact → aggregate a
//! [`ConvertedFileResult`]. Files within one batch are processed strictly
//! in submission order; the only parallelism is chunk-level inside one
//! document, which keeps session logs readable and bounds the number of
//! concurrently spawned engine processes.
//!
//! On the first per-file failure the controller aborts the remaining
//! batch, deletes the session output directory and all remaining staged
//! originals, and publishes a single `error` event. A partially
//! downloadable session is worse than a retryable failed one.

use crate::config::ConversionConfig;
use crate::engine::Engine;
use crate::error::ConversionError;
use crate::output::{BatchSummary, ConvertedFileResult, DocumentInfo, PartDetail};
use crate::pipeline::{parallel, partition, verify};
use crate::progress::{ProgressEvent, ProgressSink};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// One staged input document.
///
/// `original_name` is the filename as supplied at intake (arbitrary
/// encoding, already decoded to a string by the intake layer); `path` is
/// where the bytes were staged on local disk. The staged file is deleted
/// when its conversion terminates, successfully or not.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub original_name: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            original_name: original_name.into(),
        }
    }
}

/// Convert a batch of staged files into `output_dir`.
///
/// This is the primary entry point for the library. Progress milestones,
/// the terminal result, and any terminal error are delivered through
/// `sink`; the same data is also returned.
///
/// # Errors
/// Returns the first fatal error. By then the session output directory
/// and every staged original have been cleaned up and an `error` event
/// has been published. Callers resubmit; nothing is retried internally.
pub async fn convert_batch<E: Engine + ?Sized>(
    engine: &E,
    files: &[SourceFile],
    output_dir: &Path,
    config: &ConversionConfig,
    sink: &dyn ProgressSink,
) -> Result<BatchSummary, ConversionError> {
    let started = Instant::now();
    info!(
        "starting batch: {} files into {}",
        files.len(),
        output_dir.display()
    );

    match run_batch(engine, files, output_dir, config, sink).await {
        Ok(results) => {
            let summary = BatchSummary {
                total_output_bytes: results.iter().map(|r| r.total_bytes).sum(),
                files: results,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            info!(
                "batch complete: {} files, {} total, {}ms",
                summary.files.len(),
                human_bytes(summary.total_output_bytes),
                summary.duration_ms
            );
            sink.publish(ProgressEvent::Result {
                data: summary.clone(),
            });
            Ok(summary)
        }
        Err(err) => {
            warn!("batch failed: {err}");
            cleanup_failed_batch(output_dir, files).await;
            sink.publish(ProgressEvent::Error {
                message: err.to_string(),
            });
            Err(err)
        }
    }
}

/// Page count and staged size of a document, without converting anything.
pub async fn inspect<E: Engine + ?Sized>(
    engine: &E,
    path: &Path,
) -> Result<DocumentInfo, ConversionError> {
    let page_count = engine.count_pages(path).await?;
    let file_bytes = tokio::fs::metadata(path)
        .await
        .map_err(|_| ConversionError::FileNotFound {
            path: path.to_path_buf(),
        })?
        .len();
    Ok(DocumentInfo {
        page_count,
        file_bytes,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_batch<E: Engine + ?Sized>(
    engine: &E,
    files: &[SourceFile],
    output_dir: &Path,
    config: &ConversionConfig,
    sink: &dyn ProgressSink,
) -> Result<Vec<ConvertedFileResult>, ConversionError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| ConversionError::OutputWrite {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let result = convert_one(engine, file, output_dir, config, sink).await?;
        // The staged original has served its purpose once its conversion
        // terminates.
        remove_best_effort(&file.path).await;
        results.push(result);
    }
    Ok(results)
}

async fn convert_one<E: Engine + ?Sized>(
    engine: &E,
    file: &SourceFile,
    output_dir: &Path,
    config: &ConversionConfig,
    sink: &dyn ProgressSink,
) -> Result<ConvertedFileResult, ConversionError> {
    validate_staged(&file.path)?;

    let name = file.original_name.as_str();
    let stem = output_stem(name);
    sink.publish(ProgressEvent::log(format!("Converting {name} …")));

    let on_chunk = |done: usize, total: usize| {
        sink.publish(ProgressEvent::log(format!(
            "{name}: chunk {done}/{total} converted"
        )));
    };

    // ── Step 1: convert the whole document ──────────────────────────────
    let whole_name = format!("{stem}.pdf");
    let whole_path = output_dir.join(&whole_name);
    parallel::convert_document(engine, &file.path, &whole_path, config, &on_chunk).await?;

    // ── Step 2: measure ─────────────────────────────────────────────────
    let whole_bytes = measure(&whole_path).await?;
    sink.publish(ProgressEvent::log(format!(
        "{name}: converted, {}",
        human_bytes(whole_bytes)
    )));

    // ── Step 3a: under the ceiling, verify and finish ───────────────────
    if whole_bytes <= config.ceiling_bytes {
        let conformance = verify::verify(&whole_path);
        sink.publish(ProgressEvent::log(format!(
            "{name}: conformance {}",
            conformance.label.as_deref().unwrap_or("not declared")
        )));
        return Ok(ConvertedFileResult {
            original_name: name.to_string(),
            output_name: whole_name,
            total_bytes: whole_bytes,
            was_split: false,
            part_count: 1,
            verified: conformance.compliant,
            conformance: conformance.label,
            parts: Vec::new(),
        });
    }

    // ── Step 3b: over the ceiling, partition and convert per range ──────
    sink.publish(ProgressEvent::log(format!(
        "{name}: {} exceeds the {} ceiling, splitting",
        human_bytes(whole_bytes),
        human_bytes(config.ceiling_bytes)
    )));
    let plan = partition::partition(engine, &file.path, config.ceiling_bytes).await?;
    sink.publish(ProgressEvent::log(format!(
        "{name}: split into {} parts",
        plan.len()
    )));
    remove_best_effort(&whole_path).await;

    let extract_dir =
        tempfile::tempdir().map_err(|e| ConversionError::Internal(format!("temp dir: {e}")))?;
    let mut parts: Vec<PartDetail> = Vec::with_capacity(plan.len());
    let mut total_bytes = 0u64;

    for (i, planned) in plan.iter().enumerate() {
        let part_name = format!("{stem}.part{}.pdf", i + 1);
        let part_path = output_dir.join(&part_name);
        let extracted = extract_dir.path().join(format!("range_{i:03}.pdf"));

        engine.extract_pages(&file.path, planned.range, &extracted).await?;
        parallel::convert_document(engine, &extracted, &part_path, config, &on_chunk).await?;
        remove_best_effort(&extracted).await;

        let bytes = measure(&part_path).await?;
        total_bytes += bytes;
        let conformance = verify::verify(&part_path);
        let over_ceiling = planned.over_ceiling || bytes > config.ceiling_bytes;
        if over_ceiling {
            sink.publish(ProgressEvent::log(format!(
                "{name}: warning: part {} (pages {}) is {} and cannot be reduced below the ceiling",
                i + 1,
                planned.range,
                human_bytes(bytes)
            )));
        }
        sink.publish(ProgressEvent::log(format!(
            "{name}: part {}/{} (pages {}): {}, conformance {}",
            i + 1,
            plan.len(),
            planned.range,
            human_bytes(bytes),
            conformance.label.as_deref().unwrap_or("not declared")
        )));

        parts.push(PartDetail {
            name: part_name,
            bytes,
            verified: conformance.compliant,
            conformance: conformance.label,
            over_ceiling,
        });
    }

    let verified = parts.iter().all(|p| p.verified);
    let conformance = parts.first().and_then(|p| p.conformance.clone());
    Ok(ConvertedFileResult {
        original_name: name.to_string(),
        output_name: stem,
        total_bytes,
        was_split: true,
        part_count: parts.len(),
        verified,
        conformance,
        parts,
    })
}

/// Validate a staged path: must exist and carry the PDF magic bytes.
fn validate_staged(path: &Path) -> Result<(), ConversionError> {
    let mut f = std::fs::File::open(path).map_err(|_| ConversionError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(ConversionError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

async fn measure(path: &Path) -> Result<u64, ConversionError> {
    Ok(tokio::fs::metadata(path)
        .await
        .map_err(|source| ConversionError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })?
        .len())
}

/// Delete a file, logging (not propagating) failures other than NotFound.
async fn remove_best_effort(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove {}: {e}", path.display());
        }
    }
}

/// On whole-batch failure: the entire session output directory and every
/// staged original go away; no orphaned artifacts survive a failed run.
async fn cleanup_failed_batch(output_dir: &Path, files: &[SourceFile]) {
    if let Err(e) = tokio::fs::remove_dir_all(output_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(
                "failed to remove session directory {}: {e}",
                output_dir.display()
            );
        }
    }
    for file in files {
        remove_best_effort(&file.path).await;
    }
}

/// Derive a safe output stem from an intake-supplied filename.
///
/// Upload names arrive in arbitrary encodings and may embed path
/// separators; only the final component's stem survives, stripped of
/// control characters.
fn output_stem(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let cleaned: String = stem.chars().filter(|c| !c.is_control()).collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

fn human_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB)
    } else if bytes as f64 >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB)
    } else {
        format!("{bytes} B")
    }
}
