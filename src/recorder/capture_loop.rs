//! Capture loop
//!
//! Pulls frames at a fixed cadence, turns them into feature vectors and
//! either classifies them, feeds them back as training examples, or both.
//! The loop runs as a Tokio task until its handle is dropped.

use super::state::{EventSender, SessionEvent, SharedRecording};
use crate::capture::{FeatureExtractor, FrameSource, PresentationSink};
use crate::classifier::{ClassLabel, FeatureVector, Prediction, SharedClassifier};
use crate::utils::error::AppResult;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Labels waiting for a single example from the next captured frame
pub type ExampleRequests = Arc<Mutex<VecDeque<ClassLabel>>>;

/// State the loop shares with the command handlers
#[derive(Clone)]
pub struct LoopContext {
    pub classifier: SharedClassifier,
    pub recording: SharedRecording,
    pub requests: ExampleRequests,
    pub event_tx: EventSender,
}

/// What one loop iteration did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Whether a frame was captured at all
    pub captured: bool,

    /// Prediction emitted to the sink
    pub prediction: Option<Prediction>,

    /// Class that received the frame as a recording example
    pub recorded: Option<ClassLabel>,

    /// Classes that received the frame as a one-shot example
    pub requested: Vec<ClassLabel>,
}

/// Per-frame classification and recording loop
pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    extractor: Arc<dyn FeatureExtractor>,
    sink: Arc<dyn PresentationSink>,
    context: LoopContext,
    k: usize,
    frame_interval: Duration,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        extractor: Arc<dyn FeatureExtractor>,
        sink: Arc<dyn PresentationSink>,
        context: LoopContext,
        k: usize,
        frame_interval: Duration,
    ) -> Self {
        Self {
            source,
            extractor,
            sink,
            context,
            k,
            frame_interval,
        }
    }

    /// Process one frame slot.
    ///
    /// Nothing is captured when there is nothing to classify, record or
    /// fulfil. The frame buffer is released as soon as its vector exists,
    /// whether or not extraction succeeded.
    pub async fn step(&mut self) -> AppResult<StepReport> {
        let classify = self.context.classifier.lock().num_classes() > 0;
        let recording = self.context.recording.read().label_at(Instant::now()).is_some();
        let requested = !self.context.requests.lock().is_empty();
        if !classify && !recording && !requested {
            return Ok(StepReport::default());
        }

        let frame = self.source.next_frame().await?;
        let extracted = self.extractor.extract(&frame).await;
        drop(frame);
        let vector = extracted?;

        let mut report = StepReport {
            captured: true,
            ..StepReport::default()
        };

        // Classify against the dataset as it was before this frame
        let prediction = {
            let classifier = self.context.classifier.lock();
            if classifier.num_classes() > 0 {
                Some(classifier.predict(&vector, self.k)?)
            } else {
                None
            }
        };
        if let Some(prediction) = prediction {
            self.sink.on_classification(&prediction);
            report.prediction = Some(prediction);
        }

        // The window may have closed while the frame was on its way; the
        // timer must not close it between the add and the count
        {
            let mut recording = self.context.recording.write();
            if let Some(label) = recording.label_at(Instant::now()).cloned() {
                self.add_example(&vector, label.clone())?;
                recording.record_example();
                report.recorded = Some(label);
            }
        }

        let requests: Vec<ClassLabel> = self.context.requests.lock().drain(..).collect();
        for label in requests {
            self.add_example(&vector, label.clone())?;
            tracing::info!("Added example for '{}'", label);
            report.requested.push(label);
        }

        Ok(report)
    }

    fn add_example(&self, vector: &FeatureVector, label: ClassLabel) -> AppResult<()> {
        let count = {
            let mut classifier = self.context.classifier.lock();
            classifier.add_example(vector.clone(), label.clone())?;
            classifier.class_counts().get(&label).copied().unwrap_or(0)
        };
        let _ = self
            .context
            .event_tx
            .send(SessionEvent::ExampleAdded { label, count });
        Ok(())
    }

    /// Run forever, one step per frame tick. A failed frame is logged and
    /// the loop moves on to the next one.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Capture loop started on {} (every {:?}, k={})",
            self.source.id(),
            self.frame_interval,
            self.k
        );

        loop {
            ticker.tick().await;
            if let Err(e) = self.step().await {
                tracing::warn!("Skipping frame: {}", e);
                let _ = self.context.event_tx.send(SessionEvent::FrameFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Start the loop on the Tokio runtime
    pub fn spawn(self) -> CaptureHandle {
        CaptureHandle {
            task: tokio::spawn(self.run()),
        }
    }
}

/// Owner of a running capture loop; dropping it stops the loop
pub struct CaptureHandle {
    task: JoinHandle<()>,
}

impl CaptureHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop
    pub fn shutdown(self) {
        tracing::info!("Stopping capture loop");
        self.task.abort();
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
