//! Subprocess implementation of the [`Engine`] trait.
//!
//! Two binaries back the adapter: Ghostscript (`gs`) performs the PDF/A
//! conversion, qpdf performs page counting, range extraction, and merge.
//! Both are invoked through [`tokio::process::Command`] with fixed argument
//! templates; stdout and stderr are captured in full so diagnostics travel
//! inside [`EngineError`] instead of leaking onto the host's terminal.
//!
//! ## Failure normalisation
//!
//! qpdf exits non-zero for *warnings* as well as errors, and a warning run
//! still writes a usable output file. A non-zero exit whose diagnostics
//! match the succeeded-with-warnings pattern is therefore treated as
//! success and the produced output is used as-is. Ghostscript has no such
//! convention; any non-zero exit from the conversion engine is fatal for
//! that call.

use crate::error::EngineError;
use crate::pipeline::partition::PageRange;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, warn};

/// qpdf prints this when it exits non-zero but produced a usable output.
static SUCCEEDED_WITH_WARNINGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)operation succeeded with warnings").unwrap());

// Conversion constants. Fixed so every artifact the adapter produces is
// directly comparable for conformance: PDF/A-2 target, deterministic RGB
// color policy with an sRGB output intent, ebook quality tier.
const GS_CONVERT_ARGS: &[&str] = &[
    "-dPDFA=2",
    "-dBATCH",
    "-dNOPAUSE",
    "-dNOOUTERSAVE",
    "-sDEVICE=pdfwrite",
    "-dPDFACompatibilityPolicy=1",
    "-sColorConversionStrategy=RGB",
    "-sProcessColorModel=DeviceRGB",
    "-sOutputICCProfile=srgb.icc",
    "-dPDFSETTINGS=/ebook",
];

/// Production engine adapter spawning `gs` and `qpdf` subprocesses.
pub struct ProcessEngine {
    gs: PathBuf,
    qpdf: PathBuf,
}

impl ProcessEngine {
    /// Resolve engine binaries: explicit override, then environment
    /// variable, then the bare tool name for PATH lookup.
    pub fn new(gs_override: Option<&Path>, qpdf_override: Option<&Path>) -> Self {
        Self {
            gs: resolve_binary(gs_override, "PDF2PDFA_GS", "gs"),
            qpdf: resolve_binary(qpdf_override, "PDF2PDFA_QPDF", "qpdf"),
        }
    }

    async fn run(&self, program: &Path, args: &[&str]) -> Result<Output, EngineError> {
        debug!("spawning {} {:?}", program.display(), args);
        Command::new(program)
            .args(args)
            .kill_on_drop(false)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                tool: program.display().to_string(),
                source,
            })
    }
}

fn resolve_binary(override_path: Option<&Path>, env_var: &str, fallback: &str) -> PathBuf {
    if let Some(p) = override_path {
        return p.to_path_buf();
    }
    if let Ok(env_val) = std::env::var(env_var) {
        if !env_val.trim().is_empty() {
            return PathBuf::from(env_val);
        }
    }
    PathBuf::from(fallback)
}

/// True when a qpdf run can be accepted: clean exit, or a non-zero exit
/// whose diagnostics declare that the operation succeeded with warnings.
fn qpdf_accepted(output: &Output) -> bool {
    if output.status.success() {
        return true;
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    SUCCEEDED_WITH_WARNINGS.is_match(&stderr) || SUCCEEDED_WITH_WARNINGS.is_match(&stdout)
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl crate::engine::Engine for ProcessEngine {
    async fn count_pages(&self, input: &Path) -> Result<u32, EngineError> {
        let input_arg = input.display().to_string();
        let output = self
            .run(&self.qpdf, &["--show-npages", &input_arg])
            .await?;

        if !qpdf_accepted(&output) {
            return Err(EngineError::PageCount {
                input: input.to_path_buf(),
                detail: format!("{}: {}", output.status, stderr_of(&output)),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let pages: u32 = raw
            .trim()
            .parse()
            .map_err(|_| EngineError::PageCount {
                input: input.to_path_buf(),
                detail: format!("unparseable page count: {:?}", raw.trim()),
            })?;

        if pages == 0 {
            return Err(EngineError::EmptyDocument {
                input: input.to_path_buf(),
            });
        }
        Ok(pages)
    }

    async fn extract_pages(
        &self,
        input: &Path,
        range: PageRange,
        output: &Path,
    ) -> Result<(), EngineError> {
        let input_arg = input.display().to_string();
        let output_arg = output.display().to_string();
        let range_arg = format!("{}-{}", range.start, range.end);
        let out = self
            .run(
                &self.qpdf,
                &[&input_arg, "--pages", ".", &range_arg, "--", &output_arg],
            )
            .await?;

        if !qpdf_accepted(&out) {
            return Err(EngineError::Extraction {
                input: input.to_path_buf(),
                start: range.start,
                end: range.end,
                status: out.status.to_string(),
                stderr: stderr_of(&out),
            });
        }
        if !out.status.success() {
            warn!(
                "extraction of {} pages {} exited {} with warnings; using output as-is",
                input.display(),
                range_arg,
                out.status
            );
        }
        Ok(())
    }

    async fn merge(&self, inputs: &[&Path], output: &Path) -> Result<(), EngineError> {
        let output_arg = output.display().to_string();
        let input_args: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();

        let mut args: Vec<&str> = vec!["--empty", "--pages"];
        args.extend(input_args.iter().map(String::as_str));
        args.push("--");
        args.push(&output_arg);

        let out = self.run(&self.qpdf, &args).await?;
        if !qpdf_accepted(&out) {
            return Err(EngineError::Merge {
                output: output.to_path_buf(),
                status: out.status.to_string(),
                stderr: stderr_of(&out),
            });
        }
        Ok(())
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<(), EngineError> {
        let input_arg = input.display().to_string();
        let output_flag = format!("-sOutputFile={}", output.display());

        let mut args: Vec<&str> = GS_CONVERT_ARGS.to_vec();
        args.push(&output_flag);
        args.push(&input_arg);

        let out = self.run(&self.gs, &args).await?;
        if !out.status.success() {
            return Err(EngineError::Conversion {
                input: input.to_path_buf(),
                status: out.status.to_string(),
                stderr: stderr_of(&out),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(code: i32, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw((code & 0xff) << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn clean_exit_is_accepted() {
        assert!(qpdf_accepted(&output(0, "")));
    }

    #[test]
    fn warning_exit_with_pattern_is_accepted() {
        let out = output(3, "qpdf: operation succeeded with warnings; resulting file may have some problems");
        assert!(qpdf_accepted(&out));
    }

    #[test]
    fn warning_pattern_is_case_insensitive() {
        assert!(qpdf_accepted(&output(3, "Operation Succeeded With Warnings")));
    }

    #[test]
    fn plain_failure_is_rejected() {
        assert!(!qpdf_accepted(&output(2, "qpdf: damaged xref table")));
    }

    #[test]
    fn binary_resolution_prefers_override() {
        let engine = ProcessEngine::new(Some(Path::new("/custom/gs")), None);
        assert_eq!(engine.gs, PathBuf::from("/custom/gs"));
        // no override and (normally) no env var set: bare tool name
        assert!(engine.qpdf == PathBuf::from("qpdf") || engine.qpdf.is_absolute());
    }
}
