//! Capture trait definitions
//!
//! Platform-agnostic contracts for the collaborators around the classifier:
//! where frames come from, how they become feature vectors, and where
//! predictions go.

use crate::classifier::{FeatureVector, Prediction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Capture device error: {0}")]
    Device(String),

    #[error("Feature extraction failed: {0}")]
    Extraction(String),

    #[error("Frame source closed")]
    Closed,
}

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Pixel layout of a frame buffer (8 bits per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Gray8,
    GrayAlpha8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::GrayAlpha8 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Whether the color channels are red, green and blue
    pub fn is_color(&self) -> bool {
        matches!(self, PixelFormat::Rgb8 | PixelFormat::Rgba8)
    }
}

/// A decoded video frame.
///
/// Owns its pixel buffer; dropping the frame releases it. The buffer always
/// matches the dimensions, so `Frame::new` is the only way to build one.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Create a frame, checking the buffer size against the dimensions
    pub fn new(
        index: u64,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> CaptureResult<Self> {
        let expected = width as usize * height as usize * format.channels();
        if width == 0 || height == 0 {
            return Err(CaptureError::Decode(format!(
                "frame has empty dimensions {}x{}",
                width, height
            )));
        }
        if data.len() != expected {
            return Err(CaptureError::Decode(format!(
                "{}x{} {:?} frame needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            index,
            width,
            height,
            format,
            data,
            captured_at: Utc::now(),
        })
    }

    /// Sequence number assigned by the source
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Layout of the pixel bytes
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row-major pixel bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Bytes of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.format.channels();
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[offset..offset + channels]
    }
}

/// A lazy, endless sequence of frames
#[async_trait]
pub trait FrameSource: Send {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Wait for and return the next frame
    async fn next_frame(&mut self) -> CaptureResult<Frame>;
}

/// Turns a frame into a fixed-length feature vector
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Length of every vector this extractor produces
    fn dimension(&self) -> usize;

    async fn extract(&self, frame: &Frame) -> CaptureResult<FeatureVector>;
}

/// Receives every prediction made by the capture loop.
///
/// Fire-and-forget: implementations must not block.
pub trait PresentationSink: Send + Sync {
    fn on_classification(&self, prediction: &Prediction);
}

impl<F> PresentationSink for F
where
    F: Fn(&Prediction) + Send + Sync,
{
    fn on_classification(&self, prediction: &Prediction) {
        self(prediction)
    }
}

/// Sink that writes predictions to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl PresentationSink for TracingSink {
    fn on_classification(&self, prediction: &Prediction) {
        tracing::debug!(
            "prediction: {} probability: {:.2}",
            prediction.label,
            prediction.confidence()
        );
    }
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,
}
