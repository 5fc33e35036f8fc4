//! Background execution: run a pipeline job off the caller's thread.
//!
//! pdfium and tesseract are blocking, so jobs run on tokio's blocking pool
//! via `spawn_blocking`. The caller gets a [`JobHandle`] to cancel the job,
//! watch its [`PipelineState`] and await its [`JobOutcome`].
//!
//! [`Converter`] adds the one-job-at-a-time rule an interactive front end
//! needs: starting a job while another is still running is refused with
//! [`ConversionError::JobAlreadyRunning`].
//!
//! All `spawn*` / `start*` functions must be called from within a tokio
//! runtime.

use crate::convert::ConversionPipeline;
use crate::error::ConversionError;
use crate::job::{
    CancelFlag, ConversionJob, ConversionSummary, JobOutcome, PageImage, PipelineState,
};
use crate::progress::EventSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// A running job.
pub struct JobHandle<T = ConversionSummary> {
    cancel: CancelFlag,
    state: watch::Receiver<PipelineState>,
    task: JoinHandle<JobOutcome<T>>,
}

impl<T> JobHandle<T> {
    /// Ask the job to stop at its next checkpoint.
    pub fn cancel(&self) {
        debug!("Cancellation requested");
        self.cancel.cancel();
    }

    /// A clone of the job's cancel flag, e.g. for a Ctrl-C handler.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The most recent pipeline state.
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// A receiver that is notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job to reach a terminal state.
    ///
    /// Only fails if the worker itself panicked.
    pub async fn wait(self) -> Result<JobOutcome<T>, ConversionError> {
        self.task
            .await
            .map_err(|e| ConversionError::Internal(format!("Conversion task panicked: {}", e)))
    }
}

/// Forwards events to the caller's sink and mirrors state changes into a
/// watch channel.
struct StateTracker {
    inner: Arc<dyn EventSink>,
    state: watch::Sender<PipelineState>,
}

impl EventSink for StateTracker {
    fn on_message(&self, message: &str) {
        self.inner.on_message(message);
    }

    fn on_progress(&self, permille: u16) {
        self.inner.on_progress(permille);
    }

    fn on_state_change(&self, state: PipelineState) {
        self.state.send_replace(state);
        self.inner.on_state_change(state);
    }
}

fn spawn_job<T, F>(sink: Arc<dyn EventSink>, guard: Option<BusyGuard>, job: F) -> JobHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn EventSink, &CancelFlag) -> JobOutcome<T> + Send + 'static,
{
    let cancel = CancelFlag::new();
    let (tx, rx) = watch::channel(PipelineState::Idle);
    let tracker = StateTracker { inner: sink, state: tx };
    let worker_cancel = cancel.clone();

    let task = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        job(&tracker, &worker_cancel)
    });

    JobHandle {
        cancel,
        state: rx,
        task,
    }
}

impl ConversionPipeline {
    /// Run [`ConversionPipeline::run`] on the blocking pool.
    pub fn spawn(&self, job: ConversionJob, sink: Arc<dyn EventSink>) -> JobHandle {
        self.spawn_guarded(job, sink, None)
    }

    /// Run [`ConversionPipeline::render_pages`] on the blocking pool.
    pub fn spawn_render(
        &self,
        job: ConversionJob,
        sink: Arc<dyn EventSink>,
    ) -> JobHandle<Vec<PageImage>> {
        self.spawn_render_guarded(job, sink, None)
    }

    /// Run [`ConversionPipeline::transcribe`] on the blocking pool.
    pub fn spawn_transcribe(
        &self,
        job: ConversionJob,
        images: Vec<PageImage>,
        sink: Arc<dyn EventSink>,
    ) -> JobHandle {
        self.spawn_transcribe_guarded(job, images, sink, None)
    }

    fn spawn_guarded(
        &self,
        job: ConversionJob,
        sink: Arc<dyn EventSink>,
        guard: Option<BusyGuard>,
    ) -> JobHandle {
        let pipeline = self.clone();
        spawn_job(sink, guard, move |sink, cancel| pipeline.run(&job, sink, cancel))
    }

    fn spawn_render_guarded(
        &self,
        job: ConversionJob,
        sink: Arc<dyn EventSink>,
        guard: Option<BusyGuard>,
    ) -> JobHandle<Vec<PageImage>> {
        let pipeline = self.clone();
        spawn_job(sink, guard, move |sink, cancel| {
            pipeline.render_pages(&job, sink, cancel)
        })
    }

    fn spawn_transcribe_guarded(
        &self,
        job: ConversionJob,
        images: Vec<PageImage>,
        sink: Arc<dyn EventSink>,
        guard: Option<BusyGuard>,
    ) -> JobHandle {
        let pipeline = self.clone();
        spawn_job(sink, guard, move |sink, cancel| {
            pipeline.transcribe(&job, &images, sink, cancel)
        })
    }
}

// ── Single-job converter ─────────────────────────────────────────────────

/// Clears the busy flag when the worker finishes, panics included.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, ConversionError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ConversionError::JobAlreadyRunning)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs at most one job at a time.
#[derive(Clone)]
pub struct Converter {
    pipeline: ConversionPipeline,
    busy: Arc<AtomicBool>,
}

impl Converter {
    pub fn new(pipeline: ConversionPipeline) -> Self {
        Self {
            pipeline,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pipeline(&self) -> &ConversionPipeline {
        &self.pipeline
    }

    /// Whether a job started by this converter has not finished yet.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start a full conversion.
    pub fn start(
        &self,
        job: ConversionJob,
        sink: Arc<dyn EventSink>,
    ) -> Result<JobHandle, ConversionError> {
        let guard = BusyGuard::acquire(&self.busy)?;
        Ok(self.pipeline.spawn_guarded(job, sink, Some(guard)))
    }

    /// Start a render-only job.
    pub fn start_render(
        &self,
        job: ConversionJob,
        sink: Arc<dyn EventSink>,
    ) -> Result<JobHandle<Vec<PageImage>>, ConversionError> {
        let guard = BusyGuard::acquire(&self.busy)?;
        Ok(self.pipeline.spawn_render_guarded(job, sink, Some(guard)))
    }

    /// Start transcription of previously rendered page images.
    pub fn start_transcribe(
        &self,
        job: ConversionJob,
        images: Vec<PageImage>,
        sink: Arc<dyn EventSink>,
    ) -> Result<JobHandle, ConversionError> {
        let guard = BusyGuard::acquire(&self.busy)?;
        Ok(self
            .pipeline
            .spawn_transcribe_guarded(job, images, sink, Some(guard)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_guard_is_exclusive_and_released_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = BusyGuard::acquire(&flag).unwrap();
        assert!(matches!(
            BusyGuard::acquire(&flag),
            Err(ConversionError::JobAlreadyRunning)
        ));
        drop(guard);
        assert!(BusyGuard::acquire(&flag).is_ok());
    }

    #[tokio::test]
    async fn spawned_job_reports_state_and_outcome() {
        let handle = spawn_job(Arc::new(crate::NoopSink), None, |sink, _cancel| {
            sink.on_state_change(PipelineState::Rasterizing);
            sink.on_state_change(PipelineState::Completed);
            JobOutcome::Completed(7usize)
        });
        let mut states = handle.watch_state();
        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.completed(), Some(7));
        assert_eq!(*states.borrow_and_update(), PipelineState::Completed);
    }

    #[tokio::test]
    async fn cancel_reaches_worker() {
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let handle = spawn_job(Arc::new(crate::NoopSink), None, move |_sink, cancel| {
            release_rx.recv().unwrap();
            if cancel.is_cancelled() {
                JobOutcome::<()>::Cancelled
            } else {
                JobOutcome::Completed(())
            }
        });
        handle.cancel();
        release_tx.send(()).unwrap();
        assert!(handle.wait().await.unwrap().is_cancelled());
    }
}
