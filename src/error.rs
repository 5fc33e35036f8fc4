//! Error types for the edgequake-transcript library.
//!
//! [`ConversionError`] covers every way a conversion job can fail. Inside
//! the pipeline these errors never escape as `Err`: they are caught at the
//! pipeline boundary, reported to the [`crate::progress::EventSink`] as an
//! `"Error: …"` message and returned as [`crate::JobOutcome::Failed`].
//!
//! Cancellation is not a variant here. A user pressing
//! "Cancel" is a normal terminal outcome ([`crate::JobOutcome::Cancelled`]).

use std::path::PathBuf;
use tessdata_langs::CatalogError;
use thiserror::Error;

/// All errors returned by the edgequake-transcript library.
#[derive(Debug, Error)]
pub enum ConversionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source PDF unreadable, or an output location unwritable.
    #[error("Cannot access '{path}': {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The requested language is neither a known alpha-3 code nor a name.
    #[error("Unknown language '{0}'\nRun with --list-languages to see installed models.")]
    UnknownLanguage(String),

    /// The language table or tessdata directory could not be read.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    // ── Stage errors ──────────────────────────────────────────────────────
    /// pdfium failed to open the document or render a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterizationFailed { page: usize, detail: String },

    /// The OCR engine could not start for the requested language.
    ///
    /// `code` is the engine's exit status, or `-1` when the engine never ran.
    #[error("Could not initialize tesseract for '{language}' -- error code: {code}\n{detail}")]
    EngineInitFailed {
        language: String,
        code: i32,
        detail: String,
    },

    /// Recognition of a single page image failed.
    #[error("OCR failed on '{image}': {detail}")]
    RecognitionFailed { image: PathBuf, detail: String },

    /// The output document could not be written.
    #[error("Failed to save document '{path}': {source}")]
    DocumentSaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Job control ───────────────────────────────────────────────────────
    /// A job is already running on this converter.
    #[error("A conversion is already running; wait for it to finish or cancel it")]
    JobAlreadyRunning,

    /// The configured job timeout elapsed before the job finished.
    #[error("Conversion timed out after {secs}s")]
    TimedOut { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or the directory containing it),\n\
or install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
