//! PDF rasterisation: render every page to a PNG file via pdfium.
//!
//! ## Why open/render split?
//!
//! The pipeline must be able to stop between pages. [`PageRasterizer::open`]
//! loads the document once and hands back a [`RasterDocument`] that renders
//! a single page per call, so the caller decides after each page whether
//! to continue. Dropping the document releases the pdfium handle.
//!
//! ## Why scale by factor?
//!
//! PDF user space is 72 units per inch. Rendering at `dpi / 72` keeps the
//! physical resolution constant across page sizes, which is what OCR
//! engines are tuned for (≈300 DPI).

use crate::error::ConversionError;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Opens PDFs for page-by-page rendering.
pub trait PageRasterizer: Send + Sync {
    fn open<'a>(&'a self, pdf: &Path) -> Result<Box<dyn RasterDocument + 'a>, ConversionError>;
}

/// A loaded PDF. Released on drop.
pub trait RasterDocument {
    fn page_count(&self) -> usize;

    /// Render the page at 0-based `index` and write it as a PNG to `dest`.
    fn render_page(&mut self, index: usize, dest: &Path) -> Result<(), ConversionError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`PageRasterizer`] backed by the pdfium library.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
    dpi: u32,
}

impl PdfiumRasterizer {
    /// Bind to pdfium and render at `dpi`.
    ///
    /// Search order: `lib_path` (file or directory), `PDFIUM_LIB_PATH`,
    /// the working directory, then the system library path.
    pub fn new(lib_path: Option<&Path>, dpi: u32) -> Result<Self, ConversionError> {
        let pdfium = bind_pdfium(lib_path)?;
        Ok(Self { pdfium, dpi })
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn open<'a>(&'a self, pdf: &Path) -> Result<Box<dyn RasterDocument + 'a>, ConversionError> {
        let document = self
            .pdfium
            .load_pdf_from_file(pdf, None)
            .map_err(|e| ConversionError::RasterizationFailed {
                page: 0,
                detail: format!("cannot open '{}': {:?}", pdf.display(), e),
            })?;
        let pages = document.pages().len() as usize;
        info!("PDF loaded: {} pages", pages);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(self.dpi as f32 / 72.0);
        Ok(Box::new(PdfiumDocument {
            document,
            render_config,
        }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    render_config: PdfRenderConfig,
}

impl RasterDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&mut self, index: usize, dest: &Path) -> Result<(), ConversionError> {
        let failed = |detail: String| ConversionError::RasterizationFailed {
            page: index + 1,
            detail,
        };

        let pages = self.document.pages();
        let page = pages
            .get(index as u16)
            .map_err(|e| failed(format!("{:?}", e)))?;
        let bitmap = page
            .render_with_config(&self.render_config)
            .map_err(|e| failed(format!("{:?}", e)))?;

        let image = bitmap.as_image().into_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );

        image
            .save_with_format(dest, ImageFormat::Png)
            .map_err(|e| failed(format!("cannot write '{}': {}", dest.display(), e)))
    }
}

fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ConversionError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = lib_path {
        candidates.push(p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        candidates.push(PathBuf::from(env_path));
    }
    candidates.push(PathBuf::from("."));

    let mut last_error = None;
    for candidate in candidates {
        let library = library_file(&candidate);
        if !library.exists() {
            continue;
        }
        match Pdfium::bind_to_library(&library) {
            Ok(bindings) => {
                debug!("Bound pdfium at {}", library.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => {
                warn!("Cannot bind pdfium at {}: {}", library.display(), e);
                last_error = Some(format!("{}: {}", library.display(), e));
            }
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| {
            ConversionError::PdfiumBindingFailed(match last_error {
                Some(previous) => format!("{previous}; system library: {e}"),
                None => format!("system library: {e}"),
            })
        })
}

/// A directory is expanded to the platform library name inside it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(Pdfium::pdfium_platform_library_name())
    } else {
        path.to_path_buf()
    }
}
