//! Pipeline stages for PDF-to-document conversion.
//!
//! Each submodule implements exactly one step behind a small trait, so the
//! orchestration in [`crate::convert`] can be exercised with stand-in
//! stages and a backend can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ [pages] ──▶ ocr ──▶ document
//! (pdfium)   (review)    (tesseract)  (docx / txt)
//! ```
//!
//! 1. [`render`]   rasterise every page to `<stem>-<N>.png`; pdfium is
//!    blocking, so this runs on the worker thread
//! 2. [`pages`]    optional review step between runs: rotate page images,
//!    rediscover them on disk
//! 3. [`ocr`]      initialise tesseract once, recognise each image, split
//!    the text into lines
//! 4. [`document`] one paragraph per line, saved atomically

pub mod document;
pub mod ocr;
pub mod pages;
pub mod render;
