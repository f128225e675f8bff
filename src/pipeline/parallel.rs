//! Parallel conversion orchestrator: chunk a large document, convert the
//! chunks concurrently, reassemble deterministically.
//!
//! ## Why reconvert after merge?
//!
//! Naive merging of independently converted chunks is not guaranteed to
//! satisfy the target conformance profile end-to-end: cross-chunk metadata
//! and identifiers can conflict. The merged intermediate is therefore
//! re-run through the conversion engine once more whenever more than one
//! chunk was produced. This second pass is mandatory, not an optimisation
//! opportunity.
//!
//! ## Why a threshold?
//!
//! Below a minimum page count the per-process spawn overhead plus the
//! extra merge and reconvert passes cost more than concurrency saves, so
//! small documents delegate straight to a single engine call.

use crate::config::ConversionConfig;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::pipeline::partition::split_even;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Convert `input` to the archival target at `output`, chunk-parallelising
/// across `config.workers` engine processes when the document is large
/// enough.
///
/// `on_chunk(completed, total)` fires once per converted chunk, from
/// whichever chunk finishes next. Completion order is unordered, but the
/// merge strictly respects ascending page order.
///
/// All chunk temporaries (raw extracted and converted) live in a scoped
/// temp directory and are deleted on success and failure alike; the first
/// chunk failure fails the whole call.
pub async fn convert_document<E, F>(
    engine: &E,
    input: &Path,
    output: &Path,
    config: &ConversionConfig,
    on_chunk: F,
) -> Result<(), EngineError>
where
    E: Engine + ?Sized,
    F: Fn(usize, usize) + Send + Sync,
{
    let started = Instant::now();
    let pages = engine.count_pages(input).await?;

    if pages < config.parallel_page_threshold || config.workers <= 1 {
        debug!(
            "{}: {} pages below parallel threshold, single-pass conversion",
            input.display(),
            pages
        );
        return engine.convert(input, output).await;
    }

    let chunks = split_even(pages, config.workers);
    let total_chunks = chunks.len();
    if total_chunks <= 1 {
        return engine.convert(input, output).await;
    }

    debug!(
        "{}: {} pages across {} chunks",
        input.display(),
        pages,
        total_chunks
    );

    // Chunk temporaries are scoped to this call: the TempDir drop reclaims
    // them on every exit path, including the early `?` returns below.
    let tmp = tempfile::tempdir()?;

    // Extract all chunks concurrently.
    let extracted: Vec<PathBuf> = try_join_all(chunks.iter().enumerate().map(|(i, range)| {
        let path = tmp.path().join(format!("chunk_{i:03}.pdf"));
        async move {
            engine.extract_pages(input, *range, &path).await?;
            Ok::<PathBuf, EngineError>(path)
        }
    }))
    .await?;

    // Convert all chunks concurrently, reporting completions as they land.
    let done = AtomicUsize::new(0);
    let converted: Vec<PathBuf> = try_join_all(extracted.iter().enumerate().map(|(i, src)| {
        let dst = tmp.path().join(format!("chunk_{i:03}.pdfa.pdf"));
        let done = &done;
        let on_chunk = &on_chunk;
        async move {
            engine.convert(src, &dst).await?;
            let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
            on_chunk(completed, total_chunks);
            Ok::<PathBuf, EngineError>(dst)
        }
    }))
    .await?;

    // Reassemble in ascending page-range order (the chunk index encodes
    // it), then reconvert the merged intermediate.
    let merged = tmp.path().join("merged.pdf");
    let ordered: Vec<&Path> = converted.iter().map(PathBuf::as_path).collect();
    engine.merge(&ordered, &merged).await?;
    engine.convert(&merged, output).await?;

    info!(
        "{}: converted {} pages in {} chunks, {}ms",
        input.display(),
        pages,
        total_chunks,
        started.elapsed().as_millis()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::partition::PageRange;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Script-recording fake: appends every engine call to a shared log so
    /// tests can assert ordering constraints (merge after conversions,
    /// reconvert last, ascending merge order).
    struct RecordingEngine {
        pages: u32,
        calls: Mutex<Vec<String>>,
        fail_convert_of: Option<String>,
    }

    impl RecordingEngine {
        fn new(pages: u32) -> Self {
            Self {
                pages,
                calls: Mutex::new(Vec::new()),
                fail_convert_of: None,
            }
        }

        fn record(&self, line: String) {
            self.calls.lock().unwrap().push(line);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Engine for RecordingEngine {
        async fn count_pages(&self, _input: &Path) -> Result<u32, EngineError> {
            Ok(self.pages)
        }

        async fn extract_pages(
            &self,
            _input: &Path,
            range: PageRange,
            output: &Path,
        ) -> Result<(), EngineError> {
            self.record(format!("extract {range}"));
            std::fs::write(output, format!("extracted {range}")).unwrap();
            Ok(())
        }

        async fn merge(&self, inputs: &[&Path], output: &Path) -> Result<(), EngineError> {
            let names: Vec<String> = inputs
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            self.record(format!("merge {}", names.join(",")));
            std::fs::write(output, "merged").unwrap();
            Ok(())
        }

        async fn convert(&self, input: &Path, output: &Path) -> Result<(), EngineError> {
            let name = input.file_name().unwrap().to_string_lossy().into_owned();
            if self.fail_convert_of.as_deref() == Some(name.as_str()) {
                return Err(EngineError::Conversion {
                    input: input.to_path_buf(),
                    status: "exit status: 1".into(),
                    stderr: "injected".into(),
                });
            }
            self.record(format!("convert {name}"));
            std::fs::write(output, "converted").unwrap();
            Ok(())
        }
    }

    fn test_config(workers: usize, threshold: u32) -> ConversionConfig {
        ConversionConfig::builder()
            .workers(workers)
            .parallel_page_threshold(threshold)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn small_document_takes_single_pass() {
        let engine = RecordingEngine::new(3);
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, "doc").unwrap();
        let output = dir.path().join("out.pdf");

        convert_document(&engine, &input, &output, &test_config(4, 10), |_, _| {})
            .await
            .unwrap();

        assert_eq!(engine.calls(), vec!["convert in.pdf"]);
    }

    #[tokio::test]
    async fn large_document_extracts_converts_merges_reconverts() {
        let engine = RecordingEngine::new(40);
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, "doc").unwrap();
        let output = dir.path().join("out.pdf");

        convert_document(&engine, &input, &output, &test_config(4, 10), |_, _| {})
            .await
            .unwrap();

        let calls = engine.calls();
        // 4 extracts + 4 chunk converts + 1 merge + 1 reconvert
        assert_eq!(calls.len(), 10);
        assert_eq!(calls.iter().filter(|c| c.starts_with("extract")).count(), 4);

        let merge_pos = calls.iter().position(|c| c.starts_with("merge")).unwrap();
        // merge comes after every chunk conversion and before the final pass
        assert_eq!(merge_pos, 8);
        assert_eq!(calls[9], "convert merged.pdf");

        // merge inputs are in ascending page-range order
        assert_eq!(
            calls[merge_pos],
            "merge chunk_000.pdfa.pdf,chunk_001.pdfa.pdf,chunk_002.pdfa.pdf,chunk_003.pdfa.pdf"
        );
        assert!(output.exists());
    }

    #[tokio::test]
    async fn chunk_progress_reaches_total() {
        let engine = RecordingEngine::new(40);
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, "doc").unwrap();
        let output = dir.path().join("out.pdf");

        let seen = Mutex::new(Vec::new());
        convert_document(&engine, &input, &output, &test_config(4, 10), |done, total| {
            seen.lock().unwrap().push((done, total));
        })
        .await
        .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[tokio::test]
    async fn chunk_failure_fails_the_call_and_cleans_temps() {
        let mut engine = RecordingEngine::new(40);
        engine.fail_convert_of = Some("chunk_002.pdf".into());
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, "doc").unwrap();
        let output = dir.path().join("out.pdf");

        let err = convert_document(&engine, &input, &output, &test_config(4, 10), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conversion { .. }));
        assert!(!output.exists());

        // nothing but the input survives in the caller's directory; all
        // chunk temporaries lived in the scoped temp dir
        let leftover: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftover, vec!["in.pdf"]);
    }

    #[tokio::test]
    async fn forced_single_worker_never_chunks() {
        let engine = RecordingEngine::new(100);
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, "doc").unwrap();
        let output = dir.path().join("out.pdf");

        convert_document(&engine, &input, &output, &test_config(1, 10), |_, _| {})
            .await
            .unwrap();
        assert_eq!(engine.calls(), vec!["convert in.pdf"]);
    }
}
