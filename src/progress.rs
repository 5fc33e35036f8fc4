//! Progress events and the sink the pipeline reports them to.
//!
//! The pipeline never talks to a UI directly. It calls an [`EventSink`]
//! with human-readable status messages and permille progress values, and
//! the host decides what to do with them: a terminal progress bar, a log
//! view, a websocket. All methods have default no-op implementations so
//! sinks only override what they care about.
//!
//! For async consumers [`event_channel`] returns a sink that forwards
//! every event into a tokio channel, plus the receiving end as a `Stream`.
//!
//! # Example
//!
//! ```rust
//! use edgequake_transcript::{EventSink, PipelineState};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct LogSink {
//!     lines: Mutex<Vec<String>>,
//! }
//!
//! impl EventSink for LogSink {
//!     fn on_message(&self, message: &str) {
//!         self.lines.lock().unwrap().push(message.to_string());
//!     }
//! }
//!
//! let sink = LogSink::default();
//! sink.on_message("Starting OCR...");
//! sink.on_progress(450); // ignored by this sink
//! sink.on_state_change(PipelineState::RecognizingText);
//! assert_eq!(sink.lines.lock().unwrap().len(), 1);
//! ```

use crate::job::PipelineState;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One status update published by a running job.
///
/// Exactly one payload is present per event. Use [`ProgressEvent::message`]
/// / [`ProgressEvent::progress`] to inspect an event whose kind is unknown,
/// and the `expect_*` accessors where the kind is part of the caller's
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Human-readable status line.
    Message(String),
    /// Permille completion in `[0, 1000]`.
    Progress(u16),
}

impl ProgressEvent {
    pub fn message(&self) -> Option<&str> {
        match self {
            ProgressEvent::Message(m) => Some(m),
            ProgressEvent::Progress(_) => None,
        }
    }

    pub fn progress(&self) -> Option<u16> {
        match self {
            ProgressEvent::Progress(p) => Some(*p),
            ProgressEvent::Message(_) => None,
        }
    }

    /// The message payload.
    ///
    /// # Panics
    /// If this is a progress event. Reading the wrong payload is a bug in
    /// the consumer, not a runtime condition.
    pub fn expect_message(&self) -> &str {
        match self {
            ProgressEvent::Message(m) => m,
            ProgressEvent::Progress(p) => {
                panic!("progress event ({p}) accessed through the wrong accessor: expect_message")
            }
        }
    }

    /// The progress payload.
    ///
    /// # Panics
    /// If this is a message event.
    pub fn expect_progress(&self) -> u16 {
        match self {
            ProgressEvent::Progress(p) => *p,
            ProgressEvent::Message(m) => {
                panic!("message event ({m:?}) accessed through the wrong accessor: expect_progress")
            }
        }
    }
}

/// Receives events from a running pipeline.
///
/// Called from the blocking worker thread, hence `Send + Sync`. Calls for a
/// single job are strictly sequential and arrive in emission order.
pub trait EventSink: Send + Sync {
    /// A status line such as `"Performing OCR on doc-2.png"`.
    fn on_message(&self, message: &str) {
        let _ = message;
    }

    /// Overall job progress, permille in `[0, 1000]`.
    fn on_progress(&self, permille: u16) {
        let _ = permille;
    }

    /// The pipeline moved to a new state.
    fn on_state_change(&self, state: PipelineState) {
        let _ = state;
    }
}

/// Discards every event.
pub struct NoopSink;

impl EventSink for NoopSink {}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn on_message(&self, message: &str) {
        (**self).on_message(message)
    }

    fn on_progress(&self, permille: u16) {
        (**self).on_progress(permille)
    }

    fn on_state_change(&self, state: PipelineState) {
        (**self).on_state_change(state)
    }
}

// ── Channel sink ─────────────────────────────────────────────────────────

/// Forwards messages and progress into an unbounded tokio channel.
///
/// State changes are not forwarded; watch them through
/// [`crate::JobHandle::state`]. Events sent after the receiver is dropped
/// are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn on_message(&self, message: &str) {
        let _ = self.tx.send(ProgressEvent::Message(message.to_string()));
    }

    fn on_progress(&self, permille: u16) {
        let _ = self.tx.send(ProgressEvent::Progress(permille));
    }
}

/// A [`ChannelSink`] and the stream of events it produces.
///
/// The stream ends once every clone of the sink has been dropped, i.e. when
/// the job that owns it has finished.
pub fn event_channel() -> (ChannelSink, UnboundedReceiverStream<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink::new(tx), UnboundedReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn accessors_match_kind() {
        let m = ProgressEvent::Message("Starting OCR...".into());
        let p = ProgressEvent::Progress(300);
        assert_eq!(m.message(), Some("Starting OCR..."));
        assert_eq!(m.progress(), None);
        assert_eq!(p.progress(), Some(300));
        assert_eq!(p.message(), None);
        assert_eq!(m.expect_message(), "Starting OCR...");
        assert_eq!(p.expect_progress(), 300);
    }

    #[test]
    #[should_panic(expected = "wrong accessor")]
    fn reading_progress_from_message_panics() {
        ProgressEvent::Message("Done".into()).expect_progress();
    }

    #[test]
    #[should_panic(expected = "wrong accessor")]
    fn reading_message_from_progress_panics() {
        ProgressEvent::Progress(1000).expect_message();
    }

    #[test]
    fn events_serialise_with_kind_tag() {
        let json = serde_json::to_string(&ProgressEvent::Progress(42)).unwrap();
        assert_eq!(json, r#"{"kind":"progress","value":42}"#);
        let json = serde_json::to_string(&ProgressEvent::Message("Done".into())).unwrap();
        assert_eq!(json, r#"{"kind":"message","value":"Done"}"#);
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        sink.on_message("hello");
        sink.on_progress(1000);
        sink.on_state_change(PipelineState::Completed);
    }

    #[tokio::test]
    async fn channel_preserves_emission_order() {
        let (sink, stream) = event_channel();
        sink.on_message("The document consists of 2 pages");
        sink.on_progress(150);
        sink.on_state_change(PipelineState::Rasterizing);
        sink.on_progress(300);
        drop(sink);

        let events: Vec<ProgressEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::Message("The document consists of 2 pages".into()),
                ProgressEvent::Progress(150),
                ProgressEvent::Progress(300),
            ]
        );
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, stream) = event_channel();
        drop(stream);
        sink.on_message("nobody listening");
        sink.on_progress(10);
    }
}
