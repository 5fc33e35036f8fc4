//! Job model: what is being converted, where its artifacts go, how it ends.
//!
//! A [`ConversionJob`] is created when the user picks a file and is never
//! mutated afterwards. Every path the pipeline writes is derived from the
//! canonical source path:
//!
//! ```text
//! /scans/letter.pdf   source
//! /scans/letter-1.png page images, one per page (left on disk)
//! /scans/letter.docx  output document (only on success)
//! ```

use crate::config::OutputFormat;
use crate::error::ConversionError;
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A single conversion request: source PDF + OCR language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    source: PathBuf,
    language: String,
}

impl ConversionJob {
    /// Validate `source` and create a job for it.
    ///
    /// The path is canonicalised and must start with the `%PDF` magic bytes.
    /// `language` is the tesseract model name (an ISO 639-2 code such as
    /// `"eng"`); resolving display names is the caller's job, see
    /// [`tessdata_langs::LanguageCatalog::resolve`].
    pub fn new(
        source: impl AsRef<Path>,
        language: impl Into<String>,
    ) -> Result<Self, ConversionError> {
        let source = source.as_ref();
        let canonical = source
            .canonicalize()
            .map_err(|e| ConversionError::FileAccess {
                path: source.to_path_buf(),
                source: e,
            })?;

        let mut file = std::fs::File::open(&canonical).map_err(|e| ConversionError::FileAccess {
            path: canonical.clone(),
            source: e,
        })?;
        let mut magic = [0u8; 4];
        if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
            return Err(ConversionError::NotAPdf {
                path: canonical,
                magic,
            });
        }

        debug!("Resolved source PDF: {}", canonical.display());
        Ok(Self {
            source: canonical,
            language: language.into(),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// File name of the source without its extension.
    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }

    fn directory(&self) -> &Path {
        self.source.parent().unwrap_or_else(|| Path::new("."))
    }

    /// `<dir>/<stem>-<page>.png` for a 1-based page number.
    pub fn image_path(&self, page: usize) -> PathBuf {
        self.directory().join(format!("{}-{}.png", self.stem(), page))
    }

    /// `<dir>/<stem>.<ext>` for the chosen output format.
    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        self.source.with_extension(format.extension())
    }
}

/// One rasterised page on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageImage {
    /// 1-based page number.
    pub index: usize,
    pub path: PathBuf,
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared cooperative cancellation flag.
///
/// The controlling thread calls [`CancelFlag::cancel`]; the worker polls
/// [`CancelFlag::is_cancelled`] once per unit of work. Nothing is
/// interrupted mid-page.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── State machine ────────────────────────────────────────────────────────

/// Where a pipeline run currently is.
///
/// ```text
/// Idle ─▶ Rasterizing ─▶ RecognizingText ─▶ WritingDocument ─▶ Completed
///              │                │                  │
///              └────────────────┴──────────────────┴─▶ Cancelled | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PipelineState {
    #[default]
    Idle,
    Rasterizing,
    RecognizingText,
    WritingDocument,
    Completed,
    Cancelled,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Cancelled | PipelineState::Failed
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Rasterizing => "rasterizing",
            PipelineState::RecognizingText => "recognizing text",
            PipelineState::WritingDocument => "writing document",
            PipelineState::Completed => "completed",
            PipelineState::Cancelled => "cancelled",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────────

/// What a successful full conversion produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    /// The written document.
    pub output: PathBuf,
    /// Number of page images recognised.
    pub pages: usize,
    /// Number of paragraphs written (one per recognised line).
    pub lines: usize,
}

/// Terminal result of a pipeline run.
///
/// `T` is what a completed run yields: a [`ConversionSummary`] for full
/// conversions, the list of [`PageImage`]s for render-only runs.
#[derive(Debug)]
pub enum JobOutcome<T = ConversionSummary> {
    Completed(T),
    Cancelled,
    Failed(ConversionError),
}

/// Outcome of a render-only run: the page images written.
pub type RenderOutcome = JobOutcome<Vec<PageImage>>;

impl<T> JobOutcome<T> {
    /// The terminal [`PipelineState`] matching this outcome.
    pub fn state(&self) -> PipelineState {
        match self {
            JobOutcome::Completed(_) => PipelineState::Completed,
            JobOutcome::Cancelled => PipelineState::Cancelled,
            JobOutcome::Failed(_) => PipelineState::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }

    /// The completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            JobOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&ConversionError> {
        match self {
            JobOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn pdf_in(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"%PDF-1.7\n%fake\n").unwrap();
        path
    }

    #[test]
    fn artifact_paths_follow_source_stem() {
        let dir = tempfile::tempdir().unwrap();
        let job = ConversionJob::new(pdf_in(dir.path(), "doc.pdf"), "eng").unwrap();
        let root = dir.path().canonicalize().unwrap();

        assert_eq!(job.stem(), "doc");
        assert_eq!(job.image_path(1), root.join("doc-1.png"));
        assert_eq!(job.image_path(12), root.join("doc-12.png"));
        assert_eq!(job.output_path(OutputFormat::Docx), root.join("doc.docx"));
        assert_eq!(job.output_path(OutputFormat::Text), root.join("doc.txt"));
    }

    #[test]
    fn dotted_stem_keeps_inner_dots() {
        let dir = tempfile::tempdir().unwrap();
        let job = ConversionJob::new(pdf_in(dir.path(), "scan.2024.pdf"), "eng").unwrap();
        assert_eq!(job.stem(), "scan.2024");
        assert!(job.output_path(OutputFormat::Docx).ends_with("scan.2024.docx"));
    }

    #[test]
    fn missing_source_is_file_access_error() {
        let err = ConversionJob::new("/definitely/not/here.pdf", "eng").unwrap_err();
        assert!(matches!(err, ConversionError::FileAccess { .. }), "got {err:?}");
    }

    #[test]
    fn non_pdf_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        fs::write(&path, b"hello world").unwrap();
        let err = ConversionJob::new(&path, "eng").unwrap_err();
        match err {
            ConversionError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let worker_view = flag.clone();
        assert!(!worker_view.is_cancelled());
        flag.cancel();
        assert!(worker_view.is_cancelled());
    }

    #[test]
    fn terminal_states() {
        assert!(!PipelineState::Idle.is_terminal());
        assert!(!PipelineState::WritingDocument.is_terminal());
        assert!(PipelineState::Cancelled.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(JobOutcome::<()>::Cancelled.state().is_terminal());
    }
}
