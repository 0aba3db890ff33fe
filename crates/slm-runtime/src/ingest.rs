//! Plain-text document ingestion.
//!
//! Each path is read independently. A failure on one file is reported by
//! file name and never affects the others, and nothing partially decoded is
//! ever returned as a document.

use std::path::{Path, PathBuf};

use slm_core::documents::Document;
use tracing::{debug, warn};

/// Extensions read as UTF-8 text.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// Why a single file could not be ingested.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Extension is not a plain-text format.
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    /// File could not be read.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid UTF-8.
    #[error("file is not valid UTF-8")]
    NotUtf8,
}

/// One file that failed.
#[derive(Debug)]
pub struct IngestFailure {
    /// File name (last path component) of the failing path.
    pub file_name: String,
    /// Cause.
    pub error: IngestError,
}

/// Outcome of ingesting a batch of paths.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Successfully read documents, in input order.
    pub documents: Vec<Document>,
    /// Failed files, in input order.
    pub failures: Vec<IngestFailure>,
}

/// Read every path, isolating failures.
pub async fn ingest_paths(paths: &[PathBuf]) -> IngestReport {
    let mut report = IngestReport::default();
    for path in paths {
        let file_name = file_name_of(path);
        match ingest_file(path).await {
            Ok(content) => {
                debug!(file_name = %file_name, bytes = content.len(), "document ingested");
                report.documents.push(Document::new(file_name, content));
            }
            Err(error) => {
                warn!(file_name = %file_name, error = %error, "document ingest failed");
                report.failures.push(IngestFailure { file_name, error });
            }
        }
    }
    report
}

async fn ingest_file(path: &Path) -> Result<String, IngestError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(IngestError::Unsupported(if extension.is_empty() {
            "(none)".into()
        } else {
            extension
        }));
    }
    let bytes = tokio::fs::read(path).await?;
    String::from_utf8(bytes).map_err(|_| IngestError::NotUtf8)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn reads_text_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        let md = dir.path().join("README.MD");
        std::fs::write(&txt, "plain").unwrap();
        std::fs::write(&md, "# heading").unwrap();

        let report = ingest_paths(&[txt, md]).await;
        assert!(report.failures.is_empty());
        assert_eq!(
            report.documents,
            [
                Document::new("notes.txt", "plain"),
                Document::new("README.MD", "# heading")
            ]
        );
    }

    #[tokio::test]
    async fn failures_are_isolated_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.md");
        let pdf = dir.path().join("report.pdf");
        let binary = dir.path().join("blob.txt");
        let missing = dir.path().join("missing.txt");
        std::fs::write(&good, "ok").unwrap();
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        std::fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();

        let report = ingest_paths(&[pdf, good, binary, missing]).await;

        assert_eq!(report.documents, [Document::new("good.md", "ok")]);
        let names: Vec<&str> = report.failures.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["report.pdf", "blob.txt", "missing.txt"]);
        assert_matches!(&report.failures[0].error, IngestError::Unsupported(ext) if ext == "pdf");
        assert_matches!(report.failures[1].error, IngestError::NotUtf8);
        assert_matches!(report.failures[2].error, IngestError::Io(_));
    }

    #[tokio::test]
    async fn missing_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("Makefile");
        std::fs::write(&bare, "all:").unwrap();

        let report = ingest_paths(&[bare]).await;
        assert_matches!(&report.failures[0].error, IngestError::Unsupported(ext) if ext == "(none)");
    }
}
