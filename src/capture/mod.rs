//! Frame capture and feature extraction
//!
//! This module provides the frame sources, the feature extractor and the
//! presentation sink contracts used by the capture loop.

pub mod extractor;
pub mod png_source;
pub mod traits;

#[cfg(feature = "webcam")]
pub mod webcam;

// Re-export traits
pub use traits::{
    CameraInfo, CaptureError, CaptureResult, FeatureExtractor, Frame, FrameSource, PixelFormat,
    PresentationSink, TracingSink,
};

pub use extractor::{ExtractorConfig, PooledPixelExtractor, MAX_GRID_SIZE};
pub use png_source::PngDirectorySource;
