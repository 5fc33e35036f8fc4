//! # edgequake-transcript
//!
//! Turn scanned PDF documents into editable Word documents with tesseract OCR.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Render     every page → <stem>-<N>.png via pdfium      (0 → 300)
//!  ├─ 2. Recognise  tesseract per image, split into lines       (300 → 600)
//!  └─ 3. Write      one paragraph per line → <stem>.docx        (600 → 1000)
//! ```
//!
//! A job runs on a background worker, reports status messages and permille
//! progress to an [`EventSink`], and can be cancelled cooperatively between
//! pages, images and lines. It always ends in a [`JobOutcome`]: completed,
//! cancelled or failed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_transcript::{ConversionJob, ConversionPipeline, Converter, PipelineConfig, event_channel};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let converter = Converter::new(ConversionPipeline::from_config(&config)?);
//!
//!     let (sink, mut events) = event_channel();
//!     let job = ConversionJob::new("scan.pdf", "eng")?;
//!     let handle = converter.start(job, Arc::new(sink))?;
//!
//!     while let Some(event) = events.next().await {
//!         if let Some(message) = event.message() {
//!             eprintln!("{message}");
//!         }
//!     }
//!     println!("{:?}", handle.wait().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `transcript` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-transcript = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! - a pdfium shared library (`PDFIUM_LIB_PATH`, working directory or system path)
//! - the `tesseract` executable and `<lang>.traineddata` models in a tessdata
//!   directory (`TESSDATA_PREFIX` or `./tessdata`)

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    OutputFormat, PipelineConfig, PipelineConfigBuilder, ProgressWeights, PROGRESS_MAX,
};
pub use convert::ConversionPipeline;
pub use error::ConversionError;
pub use job::{
    CancelFlag, ConversionJob, ConversionSummary, JobOutcome, PageImage, PipelineState,
    RenderOutcome,
};
pub use pipeline::document::{DocumentBuilder, DocumentWriter, DocxWriter, TextWriter};
pub use pipeline::ocr::{split_lines, OcrEngine, OcrSession, TesseractEngine};
pub use pipeline::pages::{existing_page_images, rotate_page_image, PageRotation, Rotation};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer, RasterDocument};
pub use progress::{event_channel, ChannelSink, EventSink, NoopSink, ProgressEvent};
pub use tessdata_langs::{Language, LanguageCatalog};
pub use worker::{Converter, JobHandle};
