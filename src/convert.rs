//! The conversion pipeline: rasterise → recognise → write, as one job.
//!
//! ## Execution model
//!
//! [`ConversionPipeline::run`] is synchronous and blocking. It is meant to
//! run on a worker thread ([`crate::worker`] wraps it in
//! `tokio::task::spawn_blocking`) while the caller watches events and holds
//! the [`CancelFlag`].
//!
//! ## Progress
//!
//! Progress is permille. Each stage owns a slice of `0..=1000` given by
//! [`ProgressWeights`] and advances linearly over its units of work:
//!
//! ```text
//! 0 ──── rasterize ────▶ 300 ──── recognize ────▶ 600 ──── write ────▶ 1000
//!        per page               per image               per line
//! ```
//!
//! Values only move forward within a run. A cancelled run resets to 0.
//!
//! ## Stopping
//!
//! The cancel flag (and the optional timeout) is polled at stage entry,
//! before every unit of work and right before saving. Stage errors and
//! cancellation both unwind to the pipeline boundary, which reports them as
//! events and turns them into a [`JobOutcome`]; nothing escapes as `Err`.

use crate::config::{PipelineConfig, ProgressWeights, PROGRESS_MAX};
use crate::error::ConversionError;
use crate::job::{
    CancelFlag, ConversionJob, ConversionSummary, JobOutcome, PageImage, PipelineState,
    RenderOutcome,
};
use crate::pipeline::document::{writer_for, DocumentWriter};
use crate::pipeline::ocr::{split_lines, OcrEngine, TesseractEngine};
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::progress::EventSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runs conversion jobs through a rasteriser, an OCR engine and a writer.
///
/// Cheap to clone; the stages are shared.
#[derive(Clone)]
pub struct ConversionPipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn OcrEngine>,
    writer: Arc<dyn DocumentWriter>,
    weights: ProgressWeights,
    timeout: Option<Duration>,
}

impl ConversionPipeline {
    /// Assemble a pipeline from explicit stages with default weights and no timeout.
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        engine: Arc<dyn OcrEngine>,
        writer: Arc<dyn DocumentWriter>,
    ) -> Self {
        Self {
            rasterizer,
            engine,
            writer,
            weights: ProgressWeights::default(),
            timeout: None,
        }
    }

    /// Bind pdfium and tesseract as described by `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConversionError> {
        let rasterizer = PdfiumRasterizer::new(config.pdfium_lib_path.as_deref(), config.dpi)?;
        let engine = TesseractEngine::new(&config.tesseract_binary, &config.tessdata_dir);
        let mut pipeline = Self::new(
            Arc::new(rasterizer),
            Arc::new(engine),
            Arc::from(writer_for(config.output_format)),
        )
        .with_weights(config.weights);
        if let Some(secs) = config.job_timeout_secs {
            pipeline = pipeline.with_timeout(Duration::from_secs(secs));
        }
        Ok(pipeline)
    }

    pub fn with_weights(mut self, weights: ProgressWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn weights(&self) -> ProgressWeights {
        self.weights
    }

    /// Where the finished document for `job` will be written.
    pub fn output_path(&self, job: &ConversionJob) -> PathBuf {
        job.output_path(self.writer.format())
    }

    /// Full conversion: rasterise every page, recognise every image, write
    /// the document.
    pub fn run(
        &self,
        job: &ConversionJob,
        sink: &dyn EventSink,
        cancel: &CancelFlag,
    ) -> JobOutcome {
        info!(
            "Starting conversion: {} (language '{}')",
            job.source().display(),
            job.language()
        );
        let mut run = Run::new(sink, cancel, self.timeout);
        let result = self.rasterize(job, &mut run).and_then(|images| {
            let lines = self.recognize(job, &images, &mut run)?;
            let output = self.write(job, &lines, &mut run)?;
            Ok(ConversionSummary {
                output,
                pages: images.len(),
                lines: lines.len(),
            })
        });
        run.finish(result, PROGRESS_MAX)
    }

    /// Rasterise only. Leaves the page images on disk for review.
    ///
    /// A completed render ends at the rasterisation weight, where a later
    /// [`ConversionPipeline::transcribe`] picks up.
    pub fn render_pages(
        &self,
        job: &ConversionJob,
        sink: &dyn EventSink,
        cancel: &CancelFlag,
    ) -> RenderOutcome {
        info!("Rendering pages of {}", job.source().display());
        let mut run = Run::new(sink, cancel, self.timeout);
        let result = self.rasterize(job, &mut run);
        run.finish(result, self.weights.recognize_start())
    }

    /// Recognise and write from page images produced earlier.
    ///
    /// Progress starts at the rasterisation weight.
    pub fn transcribe(
        &self,
        job: &ConversionJob,
        images: &[PageImage],
        sink: &dyn EventSink,
        cancel: &CancelFlag,
    ) -> JobOutcome {
        info!(
            "Transcribing {} page image(s) of {}",
            images.len(),
            job.source().display()
        );
        let mut run = Run::new(sink, cancel, self.timeout);
        run.progress(self.weights.recognize_start());
        let result = self.recognize(job, images, &mut run).and_then(|lines| {
            let output = self.write(job, &lines, &mut run)?;
            Ok(ConversionSummary {
                output,
                pages: images.len(),
                lines: lines.len(),
            })
        });
        run.finish(result, PROGRESS_MAX)
    }

    // ── Stages ───────────────────────────────────────────────────────────

    fn rasterize(&self, job: &ConversionJob, run: &mut Run<'_>) -> Result<Vec<PageImage>, Stop> {
        run.enter(PipelineState::Rasterizing);
        run.checkpoint()?;

        let mut document = self.rasterizer.open(job.source())?;
        let total = document.page_count();
        run.message(&format!("The document consists of {total} pages"));
        run.message("Saving the pages as PNG images...");

        let mut images = Vec::with_capacity(total);
        for index in 0..total {
            run.checkpoint()?;
            let page = index + 1;
            let path = job.image_path(page);
            run.message(&format!("Saving {}...", file_name(&path)));
            document.render_page(index, &path)?;
            images.push(PageImage { index: page, path });
            run.advance(0, self.weights.rasterize(), page, total);
        }
        run.advance(0, self.weights.rasterize(), total, total);
        run.message(&format!("Saved {total} page images"));
        Ok(images)
    }

    fn recognize(
        &self,
        job: &ConversionJob,
        images: &[PageImage],
        run: &mut Run<'_>,
    ) -> Result<Vec<String>, Stop> {
        run.enter(PipelineState::RecognizingText);
        run.checkpoint()?;

        let mut session = self.engine.open(job.language())?;
        run.message("Successfully initialized tesseract");
        run.message("Starting OCR...");

        let start = self.weights.recognize_start();
        let mut lines = Vec::new();
        for (done, image) in images.iter().enumerate() {
            run.checkpoint()?;
            run.message(&format!("Performing OCR on {}", file_name(&image.path)));
            let text = session.recognize(&image.path)?;
            let page_lines = split_lines(&text);
            debug!("Page {}: {} line(s)", image.index, page_lines.len());
            lines.extend(page_lines);
            run.advance(start, self.weights.recognize(), done + 1, images.len());
        }
        run.advance(start, self.weights.recognize(), images.len(), images.len());
        run.message(&format!("OCR finished: {} lines", lines.len()));
        Ok(lines)
    }

    fn write(
        &self,
        job: &ConversionJob,
        lines: &[String],
        run: &mut Run<'_>,
    ) -> Result<PathBuf, Stop> {
        run.enter(PipelineState::WritingDocument);
        run.checkpoint()?;
        run.message(&format!(
            "Saving the text as a {} document...",
            self.writer.format().label()
        ));

        let start = self.weights.write_start();
        let mut document = self.writer.create();
        for (done, line) in lines.iter().enumerate() {
            run.checkpoint()?;
            document.add_paragraph(line);
            run.advance(start, self.weights.write(), done + 1, lines.len());
        }
        run.checkpoint()?;

        let path = self.output_path(job);
        document.save(&path)?;
        run.message(&format!("The document has been created: {}", path.display()));
        Ok(path)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── Run bookkeeping ──────────────────────────────────────────────────────

/// Why a stage stopped early.
enum Stop {
    Cancelled,
    Failed(ConversionError),
}

impl From<ConversionError> for Stop {
    fn from(e: ConversionError) -> Self {
        Stop::Failed(e)
    }
}

/// Per-run state: the sink, the stop conditions and the last progress sent.
struct Run<'a> {
    sink: &'a dyn EventSink,
    cancel: &'a CancelFlag,
    started: Instant,
    timeout: Option<Duration>,
    progress: u16,
}

impl<'a> Run<'a> {
    fn new(sink: &'a dyn EventSink, cancel: &'a CancelFlag, timeout: Option<Duration>) -> Self {
        Self {
            sink,
            cancel,
            started: Instant::now(),
            timeout,
            progress: 0,
        }
    }

    fn enter(&self, state: PipelineState) {
        debug!("Pipeline state → {}", state);
        self.sink.on_state_change(state);
    }

    fn message(&self, message: &str) {
        info!("{}", message);
        self.sink.on_message(message);
    }

    /// Publish `value` if it moves progress forward.
    fn progress(&mut self, value: u16) {
        let value = value.min(PROGRESS_MAX);
        if value > self.progress {
            self.progress = value;
            self.sink.on_progress(value);
        }
    }

    /// `done` of `total` units through the stage spanning `start..start + weight`.
    /// An empty stage counts as finished.
    fn advance(&mut self, start: u16, weight: u16, done: usize, total: usize) {
        let share = if total == 0 {
            u64::from(weight)
        } else {
            u64::from(weight) * done.min(total) as u64 / total as u64
        };
        self.progress(start.saturating_add(share as u16));
    }

    fn checkpoint(&self) -> Result<(), Stop> {
        if self.cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        if let Some(timeout) = self.timeout {
            if self.started.elapsed() >= timeout {
                return Err(Stop::Failed(ConversionError::TimedOut {
                    secs: timeout.as_secs(),
                }));
            }
        }
        Ok(())
    }

    /// Report the terminal outcome. `completed_at` is the progress a
    /// successful run ends on.
    fn finish<T>(mut self, result: Result<T, Stop>, completed_at: u16) -> JobOutcome<T> {
        let outcome = match result {
            Ok(value) => {
                self.progress(completed_at);
                self.message("Done");
                JobOutcome::Completed(value)
            }
            Err(Stop::Cancelled) => {
                self.message("Cancelled");
                self.progress = 0;
                self.sink.on_progress(0);
                JobOutcome::Cancelled
            }
            Err(Stop::Failed(e)) => {
                warn!("Conversion failed: {}", e);
                let message = format!("Error: {e}");
                self.sink.on_message(&message);
                JobOutcome::Failed(e)
            }
        };
        self.enter(outcome.state());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<u16>>,
    }

    impl EventSink for Recorder {
        fn on_progress(&self, permille: u16) {
            self.progress.lock().unwrap().push(permille);
        }
    }

    #[test]
    fn advance_is_linear_and_monotonic() {
        let sink = Recorder::default();
        let cancel = CancelFlag::new();
        let mut run = Run::new(&sink, &cancel, None);
        for done in 1..=3 {
            run.advance(0, 300, done, 3);
        }
        run.advance(300, 300, 1, 2);
        // Going backwards is ignored.
        run.advance(0, 300, 1, 3);
        assert_eq!(*sink.progress.lock().unwrap(), vec![100, 200, 300, 450]);
    }

    #[test]
    fn empty_stage_jumps_to_its_end() {
        let sink = Recorder::default();
        let cancel = CancelFlag::new();
        let mut run = Run::new(&sink, &cancel, None);
        run.advance(600, 400, 0, 0);
        assert_eq!(*sink.progress.lock().unwrap(), vec![1000]);
    }

    #[test]
    fn checkpoint_sees_cancel_and_timeout() {
        let sink = Recorder::default();
        let cancel = CancelFlag::new();
        let run = Run::new(&sink, &cancel, None);
        assert!(run.checkpoint().is_ok());
        cancel.cancel();
        assert!(matches!(run.checkpoint(), Err(Stop::Cancelled)));

        let fresh = CancelFlag::new();
        let run = Run::new(&sink, &fresh, Some(Duration::ZERO));
        assert!(matches!(
            run.checkpoint(),
            Err(Stop::Failed(ConversionError::TimedOut { secs: 0 }))
        ));
    }

    #[test]
    fn cancelled_finish_resets_progress() {
        let sink = Recorder::default();
        let cancel = CancelFlag::new();
        let mut run = Run::new(&sink, &cancel, None);
        run.progress(420);
        let outcome: JobOutcome<()> = run.finish(Err(Stop::Cancelled), PROGRESS_MAX);
        assert!(outcome.is_cancelled());
        assert_eq!(*sink.progress.lock().unwrap(), vec![420, 0]);
    }
}
