//! Text recognition: run tesseract over each page image.
//!
//! The engine is initialised once per batch ([`OcrEngine::open`]) and then
//! fed one image at a time through the returned [`OcrSession`]. Each call
//! to [`OcrSession::recognize`] owns exactly one tesseract process for the
//! duration of that image; the process is reaped before the call returns,
//! so nothing outlives a single page.

use crate::error::ConversionError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Creates recognition sessions for a language.
pub trait OcrEngine: Send + Sync {
    /// Initialise the engine for `language` (an alpha-3 model name).
    ///
    /// Fails with [`ConversionError::EngineInitFailed`] if the model is not
    /// installed or the engine cannot be started.
    fn open(&self, language: &str) -> Result<Box<dyn OcrSession>, ConversionError>;
}

/// An initialised engine. Released on drop.
pub trait OcrSession {
    /// Raw recognised text of one image.
    fn recognize(&mut self, image: &Path) -> Result<String, ConversionError>;
}

/// Split raw OCR output into lines.
///
/// Segments are separated by `\n` (a trailing `\r` is stripped). Empty
/// lines between text are kept; trailing empty lines and the form feed
/// tesseract appends after each page are not. A blank page yields no lines.
pub fn split_lines(text: &str) -> Vec<String> {
    let text = text.trim_end_matches(['\n', '\r', '\u{c}']);
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

// ── tesseract CLI ────────────────────────────────────────────────────────

/// [`OcrEngine`] that drives the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    tessdata_dir: PathBuf,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>, tessdata_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            tessdata_dir: tessdata_dir.into(),
        }
    }

    pub fn tessdata_dir(&self) -> &Path {
        &self.tessdata_dir
    }

    /// `tesseract --version`, returning the first line of its banner.
    fn check_binary(&self, language: &str) -> Result<String, ConversionError> {
        let init_failed = |code: i32, detail: String| ConversionError::EngineInitFailed {
            language: language.to_string(),
            code,
            detail,
        };

        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => init_failed(
                    -1,
                    format!(
                        "'{}' not found (install tesseract-ocr or pass --tesseract)",
                        self.binary.display()
                    ),
                ),
                _ => init_failed(-1, e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(init_failed(
                output.status.code().unwrap_or(-1),
                stderr.trim().to_string(),
            ));
        }

        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or("tesseract")
            .trim()
            .to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn open(&self, language: &str) -> Result<Box<dyn OcrSession>, ConversionError> {
        if !tessdata_langs::has_model(&self.tessdata_dir, language) {
            return Err(ConversionError::EngineInitFailed {
                language: language.to_string(),
                code: -1,
                detail: format!(
                    "no trained model at '{}'",
                    tessdata_langs::model_path(&self.tessdata_dir, language).display()
                ),
            });
        }

        let version = self.check_binary(language)?;
        info!("Using {} with language '{}'", version, language);

        Ok(Box::new(TesseractSession {
            binary: self.binary.clone(),
            tessdata_dir: self.tessdata_dir.clone(),
            language: language.to_string(),
            recognized: 0,
        }))
    }
}

struct TesseractSession {
    binary: PathBuf,
    tessdata_dir: PathBuf,
    language: String,
    recognized: usize,
}

impl OcrSession for TesseractSession {
    fn recognize(&mut self, image: &Path) -> Result<String, ConversionError> {
        let failed = |detail: String| ConversionError::RecognitionFailed {
            image: image.to_path_buf(),
            detail,
        };

        // Reject unreadable images before paying for a process.
        let (width, height) =
            image::image_dimensions(image).map_err(|e| failed(format!("cannot load image: {e}")))?;
        debug!("OCR {} ({}x{} px)", image.display(), width, height);

        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.language])
            .arg("--tessdata-dir")
            .arg(&self.tessdata_dir)
            .output()
            .map_err(|e| failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        self.recognized += 1;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Drop for TesseractSession {
    fn drop(&mut self) {
        debug!(
            "Released tesseract session '{}' after {} image(s)",
            self.language, self.recognized
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_interior_blank_lines() {
        assert_eq!(
            split_lines("Dear Sir,\n\nThank you.\n"),
            vec!["Dear Sir,", "", "Thank you."]
        );
    }

    #[test]
    fn split_drops_page_separator_and_crlf() {
        assert_eq!(split_lines("one\r\ntwo\r\n\n\u{c}"), vec!["one", "two"]);
    }

    #[test]
    fn blank_page_has_no_lines() {
        assert!(split_lines("").is_empty());
        assert!(split_lines("\n\n\u{c}").is_empty());
    }

    #[test]
    fn leading_whitespace_is_preserved() {
        assert_eq!(split_lines("  indented\nplain"), vec!["  indented", "plain"]);
    }

    #[test]
    fn missing_model_fails_before_running_binary() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TesseractEngine::new("/nonexistent/tesseract", dir.path());
        let err = engine.open("hun").err().expect("open must fail");
        match err {
            ConversionError::EngineInitFailed {
                language, code, detail,
            } => {
                assert_eq!(language, "hun");
                assert_eq!(code, -1);
                assert!(detail.contains("hun.traineddata"), "got: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_binary_is_init_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eng.traineddata"), b"model").unwrap();
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary", dir.path());
        let err = engine.open("eng").err().expect("open must fail");
        assert!(
            matches!(err, ConversionError::EngineInitFailed { code: -1, .. }),
            "got {err:?}"
        );
        assert!(err.to_string().contains("not found"));
    }
}
