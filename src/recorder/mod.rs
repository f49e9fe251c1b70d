//! Live capture and recording
//!
//! This module implements the per-frame classification loop:
//! - RecordingState / RecordingTimer for wall-clock bounded recording windows
//! - CaptureLoop to classify frames and feed examples back to the classifier

pub mod capture_loop;
pub mod state;

pub use capture_loop::{CaptureHandle, CaptureLoop, ExampleRequests, LoopContext, StepReport};
pub use state::{RecordingState, RecordingStatus, RecordingTimer, SessionEvent, SharedRecording};
