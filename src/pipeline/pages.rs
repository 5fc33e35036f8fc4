//! Page-image review helpers used between rendering and transcription.
//!
//! A render-only run leaves `<stem>-<N>.png` files next to the source. The
//! user can inspect them, fix pages scanned sideways with
//! [`rotate_page_image`], then resume with
//! [`crate::ConversionPipeline::transcribe`] on the images returned by
//! [`existing_page_images`].

use crate::error::ConversionError;
use crate::job::{ConversionJob, PageImage};
use image::ImageFormat;
use std::fmt;
use std::fs;
use std::str::FromStr;
use tracing::{debug, info};

/// Quarter turn applied to a page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl FromStr for Rotation {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cw" | "right" | "90" => Ok(Rotation::Clockwise),
            "ccw" | "left" | "-90" | "270" => Ok(Rotation::CounterClockwise),
            other => Err(ConversionError::InvalidConfig(format!(
                "unknown rotation '{other}', expected cw or ccw"
            ))),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rotation::Clockwise => "cw",
            Rotation::CounterClockwise => "ccw",
        })
    }
}

/// A rotation request for one page, written `PAGE=cw` or `PAGE=ccw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRotation {
    /// 1-based page number.
    pub page: usize,
    pub rotation: Rotation,
}

impl FromStr for PageRotation {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (page, rotation) = s.split_once('=').ok_or_else(|| {
            ConversionError::InvalidConfig(format!("expected PAGE=cw|ccw, got '{s}'"))
        })?;
        let page: usize = page
            .trim()
            .parse()
            .ok()
            .filter(|&p| p >= 1)
            .ok_or_else(|| {
                ConversionError::InvalidConfig(format!("invalid page number in '{s}'"))
            })?;
        Ok(Self {
            page,
            rotation: rotation.parse()?,
        })
    }
}

/// Rotate a page image by a quarter turn, replacing the file in place.
pub fn rotate_page_image(image: &PageImage, rotation: Rotation) -> Result<(), ConversionError> {
    let failed = |detail: String| ConversionError::RasterizationFailed {
        page: image.index,
        detail,
    };

    let decoded = image::open(&image.path)
        .map_err(|e| failed(format!("cannot load '{}': {}", image.path.display(), e)))?;
    let rotated = match rotation {
        Rotation::Clockwise => decoded.rotate90(),
        Rotation::CounterClockwise => decoded.rotate270(),
    };

    let tmp = image.path.with_extension("png.partial");
    rotated
        .save_with_format(&tmp, ImageFormat::Png)
        .map_err(|e| failed(format!("cannot write '{}': {}", tmp.display(), e)))?;
    fs::rename(&tmp, &image.path).map_err(|e| ConversionError::FileAccess {
        path: image.path.clone(),
        source: e,
    })?;

    info!("Rotated page {} {}", image.index, rotation);
    Ok(())
}

/// The page images a previous render left for `job`, in page order.
///
/// Collects `<stem>-1.png`, `<stem>-2.png`, ... up to the first gap.
pub fn existing_page_images(job: &ConversionJob) -> Vec<PageImage> {
    let images: Vec<PageImage> = (1..)
        .map(|index| PageImage {
            index,
            path: job.image_path(index),
        })
        .take_while(|image| image.path.is_file())
        .collect();
    debug!("Found {} existing page image(s) for {}", images.len(), job.stem());
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn job_in(dir: &Path) -> ConversionJob {
        let pdf = dir.join("scan.pdf");
        fs::write(&pdf, b"%PDF-1.4\n").unwrap();
        ConversionJob::new(pdf, "eng").unwrap()
    }

    #[test]
    fn rotation_parses() {
        assert_eq!("cw".parse::<Rotation>().unwrap(), Rotation::Clockwise);
        assert_eq!("CCW".parse::<Rotation>().unwrap(), Rotation::CounterClockwise);
        assert!("upside-down".parse::<Rotation>().is_err());

        let r: PageRotation = "3=ccw".parse().unwrap();
        assert_eq!(r.page, 3);
        assert_eq!(r.rotation, Rotation::CounterClockwise);
        assert!("0=cw".parse::<PageRotation>().is_err());
        assert!("cw".parse::<PageRotation>().is_err());
    }

    #[test]
    fn rotate_swaps_dimensions_and_moves_corner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan-1.png");
        let mut img = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.save(&path).unwrap();

        let page = PageImage { index: 1, path: path.clone() };
        rotate_page_image(&page, Rotation::Clockwise).unwrap();

        let rotated = image::open(&path).unwrap().into_rgb8();
        assert_eq!(rotated.dimensions(), (2, 4));
        // Top-left moves to top-right on a clockwise turn.
        assert_eq!(*rotated.get_pixel(1, 0), Rgb([255, 0, 0]));

        rotate_page_image(&page, Rotation::CounterClockwise).unwrap();
        let restored = image::open(&path).unwrap().into_rgb8();
        assert_eq!(restored.dimensions(), (4, 2));
        assert_eq!(*restored.get_pixel(0, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn rotating_missing_image_fails() {
        let page = PageImage {
            index: 7,
            path: "/nonexistent/scan-7.png".into(),
        };
        let err = rotate_page_image(&page, Rotation::Clockwise).unwrap_err();
        assert!(
            matches!(err, ConversionError::RasterizationFailed { page: 7, .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn existing_images_stop_at_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_in(dir.path());
        for n in [1, 2, 4] {
            fs::write(job.image_path(n), b"png").unwrap();
        }
        let images = existing_page_images(&job);
        let indices: Vec<usize> = images.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(images[1].path, job.image_path(2));
    }

    #[test]
    fn no_images_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        assert!(existing_page_images(&job_in(dir.path())).is_empty());
    }
}
