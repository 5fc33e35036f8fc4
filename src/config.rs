//! Configuration types for PDF-to-document conversion.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built
//! via its [`PipelineConfigBuilder`]. Every knob lives in one `Clone` struct
//! so the same config can be handed to each job the UI starts.

use crate::error::ConversionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Permille value representing a finished job.
pub const PROGRESS_MAX: u16 = 1000;

/// Configuration for a conversion job.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_transcript::{OutputFormat, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .dpi(300)
///     .tessdata_dir("/usr/share/tesseract-ocr/5/tessdata")
///     .output_format(OutputFormat::Docx)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    ///
    /// Tesseract is trained on ~300 DPI scans; lower values lose small print,
    /// higher values mostly cost time and disk space for the page images.
    pub dpi: u32,

    /// How the 0–1000 progress range is split across the three stages.
    pub weights: ProgressWeights,

    /// Directory holding `<alpha3>.traineddata` models.
    /// Default: [`tessdata_langs::default_tessdata_dir`].
    pub tessdata_dir: PathBuf,

    /// Tesseract executable (name looked up on `PATH`, or a full path). Default: `tesseract`.
    pub tesseract_binary: PathBuf,

    /// Output document format. Default: [`OutputFormat::Docx`].
    pub output_format: OutputFormat,

    /// pdfium shared library (file or containing directory).
    /// If None, `PDFIUM_LIB_PATH`, the working directory and the system
    /// library are tried in that order.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Abort the job once it has run this long. Default: None (no limit).
    ///
    /// Checked at the same points as cancellation, so a single slow page
    /// still runs to completion before the timeout is noticed.
    pub job_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            weights: ProgressWeights::default(),
            tessdata_dir: tessdata_langs::default_tessdata_dir(),
            tesseract_binary: PathBuf::from("tesseract"),
            output_format: OutputFormat::default(),
            pdfium_lib_path: None,
            job_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn weights(mut self, weights: ProgressWeights) -> Self {
        self.config.weights = weights;
        self
    }

    pub fn tessdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tessdata_dir = dir.into();
        self
    }

    pub fn tesseract_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.config.tesseract_binary = binary.into();
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn job_timeout_secs(mut self, secs: u64) -> Self {
        self.config.job_timeout_secs = Some(secs.max(1));
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ConversionError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ConversionError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        c.weights.validate()?;
        if c.tesseract_binary.as_os_str().is_empty() {
            return Err(ConversionError::InvalidConfig(
                "tesseract binary must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Progress weights ─────────────────────────────────────────────────────

/// Share of the 0–1000 progress range given to each stage.
///
/// The three weights must add up to [`PROGRESS_MAX`]. The default 300/300/400
/// gives document writing the largest share even though it is the fastest
/// stage; callers that care about a smoother bar can shift weight towards
/// recognition, e.g. `100,800,100`.
///
/// Only valid splits can be constructed; deserialisation validates too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct ProgressWeights {
    rasterize: u16,
    recognize: u16,
    write: u16,
}

#[derive(Deserialize)]
struct RawWeights {
    rasterize: u16,
    recognize: u16,
    write: u16,
}

impl TryFrom<RawWeights> for ProgressWeights {
    type Error = ConversionError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        Self::new(raw.rasterize, raw.recognize, raw.write)
    }
}

impl Default for ProgressWeights {
    fn default() -> Self {
        Self {
            rasterize: 300,
            recognize: 300,
            write: 400,
        }
    }
}

impl ProgressWeights {
    /// Create weights, rejecting splits that do not add up to 1000.
    pub fn new(rasterize: u16, recognize: u16, write: u16) -> Result<Self, ConversionError> {
        let weights = Self {
            rasterize,
            recognize,
            write,
        };
        weights.validate()?;
        Ok(weights)
    }

    fn validate(&self) -> Result<(), ConversionError> {
        let total = u32::from(self.rasterize) + u32::from(self.recognize) + u32::from(self.write);
        if total != u32::from(PROGRESS_MAX) {
            return Err(ConversionError::InvalidConfig(format!(
                "progress weights must add up to {PROGRESS_MAX}, got {}+{}+{}={total}",
                self.rasterize, self.recognize, self.write
            )));
        }
        Ok(())
    }

    pub fn rasterize(&self) -> u16 {
        self.rasterize
    }

    pub fn recognize(&self) -> u16 {
        self.recognize
    }

    pub fn write(&self) -> u16 {
        self.write
    }

    /// Permille value at which recognition starts.
    pub fn recognize_start(&self) -> u16 {
        self.rasterize
    }

    /// Permille value at which document writing starts.
    pub fn write_start(&self) -> u16 {
        self.rasterize.saturating_add(self.recognize)
    }
}

impl FromStr for ProgressWeights {
    type Err = ConversionError;

    /// Parse `"300,300,400"` (or `"30/30/40"` percent form).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s
            .split(|c: char| c == ',' || c == '/')
            .map(str::trim)
            .collect();
        let [r, o, w] = parts.as_slice() else {
            return Err(ConversionError::InvalidConfig(format!(
                "expected three weights like 300,300,400, got '{s}'"
            )));
        };
        let parse = |v: &str| {
            v.parse::<u16>().map_err(|_| {
                ConversionError::InvalidConfig(format!("invalid progress weight '{v}'"))
            })
        };
        let (r, o, w) = (parse(*r)?, parse(*o)?, parse(*w)?);
        // Percent form: 30/30/40
        if u32::from(r) + u32::from(o) + u32::from(w) == 100 {
            return Self::new(r * 10, o * 10, w * 10);
        }
        Self::new(r, o, w)
    }
}

impl fmt::Display for ProgressWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.rasterize, self.recognize, self.write)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Format of the document written at the end of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Office Open XML word-processing document (default).
    #[default]
    Docx,
    /// Plain UTF-8 text, one paragraph per line.
    Text,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Text => "txt",
        }
    }

    /// Human-readable name used in status messages.
    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "Word",
            OutputFormat::Text => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.weights, ProgressWeights::default());
        assert_eq!(config.output_format, OutputFormat::Docx);
        assert!(config.job_timeout_secs.is_none());
    }

    #[test]
    fn dpi_is_clamped() {
        let config = PipelineConfig::builder().dpi(2400).build().unwrap();
        assert_eq!(config.dpi, 600);
        let config = PipelineConfig::builder().dpi(10).build().unwrap();
        assert_eq!(config.dpi, 72);
    }

    #[test]
    fn weights_must_sum_to_1000() {
        assert!(ProgressWeights::new(300, 300, 360).is_err());
        let w = ProgressWeights::new(100, 800, 100).unwrap();
        assert_eq!(w.recognize_start(), 100);
        assert_eq!(w.write_start(), 900);
    }

    #[test]
    fn invalid_weights_fail_build() {
        let mut builder = PipelineConfig::builder();
        builder.config.weights = ProgressWeights {
            rasterize: 300,
            recognize: 300,
            write: 300,
        };
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("add up to 1000"), "got: {err}");
    }

    #[test]
    fn deserialized_weights_are_validated() {
        let w: ProgressWeights =
            serde_json::from_str(r#"{"rasterize":100,"recognize":800,"write":100}"#).unwrap();
        assert_eq!(w.write_start(), 900);

        let err = serde_json::from_str::<ProgressWeights>(
            r#"{"rasterize":40000,"recognize":40000,"write":0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("add up to 1000"), "got: {err}");
    }

    #[test]
    fn write_start_saturates() {
        let w = ProgressWeights {
            rasterize: 40000,
            recognize: 40000,
            write: 0,
        };
        assert_eq!(w.write_start(), u16::MAX);
    }

    #[test]
    fn weights_parse_permille_and_percent() {
        let w: ProgressWeights = "300, 300, 400".parse().unwrap();
        assert_eq!(w, ProgressWeights::default());
        let w: ProgressWeights = "20/50/30".parse().unwrap();
        assert_eq!(w, ProgressWeights::new(200, 500, 300).unwrap());
        assert!("300,700".parse::<ProgressWeights>().is_err());
        assert!("a,b,c".parse::<ProgressWeights>().is_err());
        assert_eq!(ProgressWeights::default().to_string(), "300,300,400");
    }

    #[test]
    fn output_format_extensions() {
        assert_eq!(OutputFormat::Docx.extension(), "docx");
        assert_eq!(OutputFormat::Text.extension(), "txt");
        assert_eq!(OutputFormat::Docx.label(), "Word");
    }
}
