//! Conformance verification: does an artifact declare the archival target?
//!
//! The check scans the produced file's metadata for the archival
//! identification markers (`pdfaid:part` and `pdfaid:conformance`,
//! case-insensitive, attribute or element XMP form). It deliberately does
//! not validate the document against the full standard (that is the
//! conversion engine's job); it only reports what the artifact *declares*,
//! which is what downstream archival intake systems inspect.
//!
//! Verification never mutates the artifact and never fails: an unreadable
//! or marker-less file reports non-compliant rather than raising.

use crate::output::Conformance;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

// Matches both XMP attribute form (pdfaid:part="2") and element form
// (<pdfaid:part>2</pdfaid:part>).
static PART_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)pdfaid:part\s*(?:=\s*"\s*|>\s*)(\d)"#).unwrap());

static LEVEL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)pdfaid:conformance\s*(?:=\s*"\s*|>\s*)([A-Za-z])"#).unwrap());

/// Report whether `path` declares an archival conformance level, and which.
///
/// The label is assembled as `pdfa-<part><level>` with the level
/// lowercased, defaulting to `b` when the part marker is present but no
/// conformance marker accompanies it.
pub fn verify(path: &Path) -> Conformance {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            debug!("cannot read {} for verification: {e}", path.display());
            return Conformance::none();
        }
    };
    let text = String::from_utf8_lossy(&bytes);

    let part = match PART_MARKER.captures(&text) {
        Some(caps) => caps[1].to_string(),
        None => return Conformance::none(),
    };

    let level = LEVEL_MARKER
        .captures(&text)
        .map(|caps| caps[1].to_lowercase())
        .unwrap_or_else(|| "b".to_string());

    Conformance {
        compliant: true,
        label: Some(format!("pdfa-{part}{level}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn attribute_form_markers() {
        let (_d, p) = artifact(r#"%PDF-1.7 … pdfaid:part="2" pdfaid:conformance="B" …"#);
        let c = verify(&p);
        assert!(c.compliant);
        assert_eq!(c.label.as_deref(), Some("pdfa-2b"));
    }

    #[test]
    fn element_form_markers() {
        let (_d, p) = artifact(
            "<pdfaid:part>3</pdfaid:part>\n<pdfaid:conformance>A</pdfaid:conformance>",
        );
        let c = verify(&p);
        assert!(c.compliant);
        assert_eq!(c.label.as_deref(), Some("pdfa-3a"));
    }

    #[test]
    fn markers_are_case_insensitive() {
        let (_d, p) = artifact(r#"PDFAID:PART="1" PDFAID:CONFORMANCE="B""#);
        assert_eq!(verify(&p).label.as_deref(), Some("pdfa-1b"));
    }

    #[test]
    fn missing_level_defaults_to_b() {
        let (_d, p) = artifact(r#"pdfaid:part="2""#);
        let c = verify(&p);
        assert!(c.compliant);
        assert_eq!(c.label.as_deref(), Some("pdfa-2b"));
    }

    #[test]
    fn no_markers_is_noncompliant() {
        let (_d, p) = artifact("%PDF-1.7 plain document, no archival metadata");
        let c = verify(&p);
        assert!(!c.compliant);
        assert!(c.label.is_none());
    }

    #[test]
    fn unreadable_file_is_noncompliant_not_an_error() {
        let c = verify(Path::new("/definitely/not/a/real/file.pdf"));
        assert!(!c.compliant);
        assert!(c.label.is_none());
    }

    #[test]
    fn verification_is_idempotent() {
        let (_d, p) = artifact(r#"pdfaid:part="2" pdfaid:conformance="B""#);
        let first = verify(&p);
        let second = verify(&p);
        assert_eq!(first, second);
        assert!(second.compliant);
    }
}
