//! CLI binary for edgequake-transcript.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs the job on a worker, and renders its events.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_transcript::{
    existing_page_images, rotate_page_image, ConversionError, ConversionJob, ConversionPipeline,
    Converter, EventSink, JobHandle, JobOutcome, LanguageCatalog, OutputFormat, PageImage,
    PageRotation, PipelineConfig, PipelineState, ProgressEvent, ProgressWeights, PROGRESS_MAX,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit status of a run the user cancelled (128 + SIGINT).
const EXIT_CANCELLED: i32 = 130;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Event sinks ──────────────────────────────────────────────────────────────

/// Terminal sink: a 0–1000 progress bar with the latest status line as its
/// message. Errors are printed above the bar so they survive `finish`.
struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:>16}  [{bar:42.green/238}] {percent:>3}%  {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(u64::from(PROGRESS_MAX));
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl EventSink for BarSink {
    fn on_message(&self, message: &str) {
        if message.starts_with("Error:") {
            self.bar.println(red(message));
        } else {
            self.bar.set_message(message.to_string());
        }
    }

    fn on_progress(&self, permille: u16) {
        self.bar.set_position(u64::from(permille));
    }

    fn on_state_change(&self, state: PipelineState) {
        if state.is_terminal() {
            self.bar.finish_and_clear();
        } else {
            self.bar.set_prefix(state.to_string());
        }
    }
}

/// Plain sink: one status line per message on stderr.
struct LogSink;

impl EventSink for LogSink {
    fn on_message(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Machine-readable sink: one JSON object per event on stdout.
struct JsonSink;

impl JsonSink {
    fn emit(&self, event: &ProgressEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    }
}

impl EventSink for JsonSink {
    fn on_message(&self, message: &str) {
        self.emit(&ProgressEvent::Message(message.to_string()));
    }

    fn on_progress(&self, permille: u16) {
        self.emit(&ProgressEvent::Progress(permille));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a scan to scan.docx (English)
  transcript scan.pdf

  # German, plain text output
  transcript -l German --format text brief.pdf

  # Render pages only, check them, fix page 3, then transcribe
  transcript --render-only scan.pdf
  transcript --rotate 3=cw scan.pdf

  # What languages are installed?
  transcript --list-languages

  # Events as JSON lines (for scripting)
  transcript --json scan.pdf

OUTPUT:
  scan-1.png .. scan-N.png   page images, next to the PDF (kept)
  scan.docx / scan.txt       the recognised text, one paragraph per line
                             (an existing file is overwritten)

ENVIRONMENT VARIABLES:
  TESSDATA_PREFIX         Directory containing <lang>.traineddata models
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  TRANSCRIPT_LANGUAGE     Default OCR language
  TRANSCRIPT_TESSERACT    tesseract executable
  RUST_LOG                Log filter override (e.g. edgequake_transcript=debug)

SETUP:
  1. Install tesseract:   apt install tesseract-ocr tesseract-ocr-deu
  2. Provide pdfium:      export PDFIUM_LIB_PATH=/opt/pdfium/lib
  3. Convert:             transcript scan.pdf
"#;

/// Convert scanned PDF documents into editable Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "transcript",
    version,
    about = "Convert scanned PDF documents into editable Word documents with tesseract OCR",
    long_about = "Render every page of a scanned PDF to a PNG image, recognise the text with \
tesseract and write it to a Word (or plain text) document next to the source, one paragraph \
per recognised line.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Scanned PDF to convert.
    #[arg(required_unless_present = "list_languages")]
    input: Option<PathBuf>,

    /// OCR language: alpha-3 code (eng, deu, hun) or name (English, German).
    #[arg(short, long, env = "TRANSCRIPT_LANGUAGE", default_value = "eng")]
    language: String,

    /// Directory containing tesseract `<lang>.traineddata` models.
    #[arg(long, env = "TESSDATA_PREFIX")]
    tessdata_dir: Option<PathBuf>,

    /// tesseract executable.
    #[arg(long, env = "TRANSCRIPT_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// pdfium shared library (file or containing directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "TRANSCRIPT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Output document format.
    #[arg(long, env = "TRANSCRIPT_FORMAT", value_enum, default_value = "docx")]
    format: FormatArg,

    /// Progress split across render/recognise/write, e.g. 300,300,400 or 30/30/40.
    #[arg(long, env = "TRANSCRIPT_WEIGHTS", default_value = "300,300,400")]
    weights: ProgressWeights,

    /// Give up after this many seconds.
    #[arg(long, env = "TRANSCRIPT_TIMEOUT")]
    timeout: Option<u64>,

    /// Only render the page images; do not run OCR.
    #[arg(long, conflicts_with = "rotate")]
    render_only: bool,

    /// Rotate a page image before OCR: PAGE=cw or PAGE=ccw (repeatable).
    /// Reuses page images from a previous run when present.
    #[arg(long, value_name = "PAGE=cw|ccw")]
    rotate: Vec<PageRotation>,

    /// List installed OCR languages and exit.
    #[arg(long)]
    list_languages: bool,

    /// Emit events (or the language list) as JSON.
    #[arg(long, env = "TRANSCRIPT_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "TRANSCRIPT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TRANSCRIPT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TRANSCRIPT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Docx,
    Text,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Docx => OutputFormat::Docx,
            FormatArg::Text => OutputFormat::Text,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar already shows every status line; keep library INFO logs out
    // of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || cli.json {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let catalog = LanguageCatalog::builtin();

    // ── Language listing ─────────────────────────────────────────────────
    if cli.list_languages {
        let installed = catalog
            .installed(&config.tessdata_dir)
            .with_context(|| format!("Failed to scan {}", config.tessdata_dir.display()))?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&installed).context("Failed to serialise languages")?
            );
        } else if installed.is_empty() {
            eprintln!(
                "No languages installed in {}",
                bold(&config.tessdata_dir.display().to_string())
            );
        } else {
            for lang in &installed {
                println!("{}  {}", lang.alpha3(), lang.name());
            }
        }
        return Ok(());
    }

    let Some(input) = cli.input.as_deref() else {
        anyhow::bail!("No input PDF given");
    };
    let language = resolve_language(&catalog, &config.tessdata_dir, &cli.language)?;
    let job = ConversionJob::new(input, language).context("Cannot use input")?;

    let pipeline = ConversionPipeline::from_config(&config).context("Failed to set up pipeline")?;
    let converter = Converter::new(pipeline);

    // ── Render only ──────────────────────────────────────────────────────
    if cli.render_only {
        let images = match render(&converter, &job, &cli).await? {
            Some(images) => images,
            None => cancelled(&cli),
        };
        if !cli.quiet && !cli.json {
            eprintln!(
                "{} {} page image(s) written next to {}",
                green("✔"),
                bold(&images.len().to_string()),
                job.source().display()
            );
        }
        return Ok(());
    }

    // ── Review step: rotate page images ──────────────────────────────────
    let outcome = if cli.rotate.is_empty() {
        let handle = converter.start(job.clone(), make_sink(&cli))?;
        finish(handle).await?
    } else {
        let mut images = existing_page_images(&job);
        if images.is_empty() {
            images = match render(&converter, &job, &cli).await? {
                Some(images) => images,
                None => cancelled(&cli),
            };
        }
        for request in &cli.rotate {
            let image = images
                .iter()
                .find(|image| image.index == request.page)
                .with_context(|| {
                    format!(
                        "Cannot rotate page {}: the document has {} page(s)",
                        request.page,
                        images.len()
                    )
                })?;
            rotate_page_image(image, request.rotation)
                .with_context(|| format!("Failed to rotate page {}", request.page))?;
        }
        let handle = converter.start_transcribe(job.clone(), images, make_sink(&cli))?;
        finish(handle).await?
    };

    match outcome {
        JobOutcome::Completed(summary) => {
            if !cli.quiet && !cli.json {
                eprintln!(
                    "{}  {} page(s), {} line(s)  →  {}",
                    green("✔"),
                    summary.pages,
                    summary.lines,
                    bold(&summary.output.display().to_string()),
                );
            }
            Ok(())
        }
        JobOutcome::Cancelled => cancelled(&cli),
        JobOutcome::Failed(e) => Err(e).context("Conversion failed"),
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .dpi(cli.dpi)
        .weights(cli.weights)
        .tesseract_binary(&cli.tesseract)
        .output_format(cli.format.into());
    if let Some(ref dir) = cli.tessdata_dir {
        builder = builder.tessdata_dir(dir);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.job_timeout_secs(secs);
    }
    builder.build().context("Invalid configuration")
}

/// Accept an installed model name verbatim (`chi_sim`), else look the
/// query up as an alpha-3 code or language name, preferring the code whose
/// model is installed (`German` gives `deu`, not `ger`).
fn resolve_language(catalog: &LanguageCatalog, tessdata_dir: &Path, query: &str) -> Result<String> {
    if tessdata_langs::has_model(tessdata_dir, query) {
        return Ok(query.to_string());
    }
    catalog
        .resolve_installed(query, tessdata_dir)
        .map(|lang| lang.alpha3().to_string())
        .ok_or_else(|| ConversionError::UnknownLanguage(query.to_string()).into())
}

fn make_sink(cli: &Cli) -> Arc<dyn EventSink> {
    if cli.json {
        Arc::new(JsonSink)
    } else if cli.quiet {
        Arc::new(edgequake_transcript::NoopSink)
    } else if cli.no_progress {
        Arc::new(LogSink)
    } else {
        BarSink::new()
    }
}

/// Run a render-only job. `None` if it was cancelled.
async fn render(
    converter: &Converter,
    job: &ConversionJob,
    cli: &Cli,
) -> Result<Option<Vec<PageImage>>> {
    let handle = converter.start_render(job.clone(), make_sink(cli))?;
    match finish(handle).await? {
        JobOutcome::Completed(images) => Ok(Some(images)),
        JobOutcome::Cancelled => Ok(None),
        JobOutcome::Failed(e) => Err(e).context("Rendering failed"),
    }
}

/// Wait for a job, turning Ctrl-C into a cooperative cancel.
async fn finish<T>(handle: JobHandle<T>) -> Result<JobOutcome<T>> {
    let cancel = handle.cancel_flag();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let outcome = handle.wait().await;
    ctrl_c.abort();
    Ok(outcome?)
}

fn cancelled(cli: &Cli) -> ! {
    if !cli.quiet && !cli.json {
        eprintln!("{} Cancelled, no document written", yellow("⚠"));
    }
    std::process::exit(EXIT_CANCELLED)
}
