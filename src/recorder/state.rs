//! Recording state management
//!
//! A recording window adds every captured frame to one class until a
//! wall-clock deadline passes. The deadline is enforced by a timer task that
//! runs independently of the frame cadence.

use crate::classifier::ClassLabel;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

/// Events emitted by a classifier session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A recording window opened
    RecordingStarted {
        id: Uuid,
        label: ClassLabel,
        duration_ms: u64,
    },
    /// A recording window closed
    RecordingFinished {
        id: Uuid,
        label: ClassLabel,
        examples_added: usize,
    },
    /// An example was added from a captured frame
    ExampleAdded { label: ClassLabel, count: usize },
    /// A frame could not be processed; the loop carries on
    FrameFailed { message: String },
    /// The dataset was written to disk
    DatasetSaved { path: String },
}

/// Sender half of the session event channel
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Current recording window, shared between the capture loop and the timer
#[derive(Debug, Clone, Default)]
pub struct RecordingState {
    active: bool,
    target_label: Option<ClassLabel>,
    deadline: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    recording_id: Option<Uuid>,
    examples_added: usize,
}

/// Shared handle to the recording state
pub type SharedRecording = Arc<RwLock<RecordingState>>;

/// Summary of a recording window that just closed
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedRecording {
    pub id: Uuid,
    pub label: ClassLabel,
    pub examples_added: usize,
}

impl RecordingState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Label being recorded, while a window is open
    pub fn active_label(&self) -> Option<&ClassLabel> {
        if self.active {
            self.target_label.as_ref()
        } else {
            None
        }
    }

    /// Label being recorded at `now`; a window past its deadline yields
    /// nothing even before its timer has fired
    pub fn label_at(&self, now: Instant) -> Option<&ClassLabel> {
        match self.deadline {
            Some(deadline) if now >= deadline => None,
            _ => self.active_label(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Open a new window, replacing any open one
    pub fn begin(&mut self, label: ClassLabel, duration: Duration) -> Uuid {
        let id = Uuid::new_v4();
        *self = Self {
            active: true,
            target_label: Some(label),
            deadline: Some(Instant::now() + duration),
            started_at: Some(Utc::now()),
            recording_id: Some(id),
            examples_added: 0,
        };
        id
    }

    /// Close the window `id` if it is still the open one
    pub fn finish(&mut self, id: Uuid) -> Option<FinishedRecording> {
        if !self.active || self.recording_id != Some(id) {
            return None;
        }
        self.active = false;
        self.target_label.clone().map(|label| FinishedRecording {
            id,
            label,
            examples_added: self.examples_added,
        })
    }

    /// Count one example added during the open window
    pub fn record_example(&mut self) {
        if self.active {
            self.examples_added += 1;
        }
    }

    /// Serializable snapshot
    pub fn status(&self) -> RecordingStatus {
        let remaining_ms = match (self.active, self.deadline) {
            (true, Some(deadline)) => deadline
                .saturating_duration_since(Instant::now())
                .as_millis() as u64,
            _ => 0,
        };
        RecordingStatus {
            active: self.active,
            target_label: self.target_label.as_ref().map(|l| l.to_string()),
            remaining_ms,
            examples_added: self.examples_added,
            started_at: self.started_at,
        }
    }
}

/// Recording status reported to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    /// Whether frames are currently being added as examples
    pub active: bool,

    /// Label of the current or most recent window
    pub target_label: Option<String>,

    /// Time left in the window in milliseconds
    pub remaining_ms: u64,

    /// Examples added during the current or most recent window
    pub examples_added: usize,

    /// When the current or most recent window opened
    pub started_at: Option<DateTime<Utc>>,
}

/// Opens recording windows and closes them when their deadline passes
#[derive(Clone)]
pub struct RecordingTimer {
    state: SharedRecording,
    event_tx: EventSender,
}

impl RecordingTimer {
    pub fn new(state: SharedRecording, event_tx: EventSender) -> Self {
        Self { state, event_tx }
    }

    /// Open a recording window for `label` lasting `duration`.
    ///
    /// Must be called from within a Tokio runtime. A window opened later
    /// replaces this one, and this window's timer then leaves it alone.
    pub fn start_recording(&self, label: ClassLabel, duration: Duration) -> Uuid {
        let (id, deadline) = {
            let mut state = self.state.write();
            let id = state.begin(label.clone(), duration);
            (id, state.deadline().unwrap_or_else(Instant::now))
        };

        tracing::info!("Recording '{}' for {:?}", label, duration);
        let _ = self.event_tx.send(SessionEvent::RecordingStarted {
            id,
            label,
            duration_ms: duration.as_millis() as u64,
        });

        let state = self.state.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let finished = state.write().finish(id);
            if let Some(done) = finished {
                tracing::info!(
                    "Recording '{}' done: {} examples added",
                    done.label,
                    done.examples_added
                );
                let _ = event_tx.send(SessionEvent::RecordingFinished {
                    id: done.id,
                    label: done.label,
                    examples_added: done.examples_added,
                });
            }
        });

        id
    }

    pub fn status(&self) -> RecordingStatus {
        self.state.read().status()
    }
}
