//! Webcam frame source using nokhwa
//!
//! The camera is owned by a dedicated capture thread. Each decoded RGB frame
//! is handed to the async side through a small bounded channel; when the
//! classifier falls behind, frames are dropped instead of queued.

use super::traits::{CameraInfo, CaptureError, CaptureResult, Frame, FrameSource, PixelFormat};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Frames buffered between the camera thread and the capture loop
const FRAME_BUFFER: usize = 2;

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Get camera index from a device id
fn camera_index(device_id: Option<&str>) -> CameraIndex {
    match device_id {
        Some(id) => match id.parse::<u32>() {
            Ok(idx) => CameraIndex::Index(idx),
            Err(_) => CameraIndex::String(id.to_string()),
        },
        None => CameraIndex::Index(0),
    }
}

/// Live camera frame source
pub struct WebcamFrameSource {
    id: String,
    frames: mpsc::Receiver<CaptureResult<Frame>>,
    running: Arc<AtomicBool>,
    capture_thread: Option<std::thread::JoinHandle<()>>,
}

impl WebcamFrameSource {
    /// Open a camera (None = first camera) and start streaming
    pub fn open(device_id: Option<String>) -> CaptureResult<Self> {
        let index = camera_index(device_id.as_deref());
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let thread_index = index.clone();

        let handle = std::thread::Builder::new()
            .name("webcam-capture".to_string())
            .spawn(move || capture_thread(thread_index, tx, thread_running))?;

        tracing::info!("Webcam capture starting on {:?}", index);

        Ok(Self {
            id: format!("webcam:{:?}", index),
            frames: rx,
            running,
            capture_thread: Some(handle),
        })
    }
}

fn capture_thread(
    index: CameraIndex,
    tx: mpsc::Sender<CaptureResult<Frame>>,
    running: Arc<AtomicBool>,
) {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

    let mut camera = match Camera::new(index.clone(), format) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to open camera {:?}: {:?}", index, e);
            let _ = tx.blocking_send(Err(CaptureError::Device(e.to_string())));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        tracing::error!("Failed to open camera stream: {:?}", e);
        let _ = tx.blocking_send(Err(CaptureError::Device(e.to_string())));
        return;
    }

    let camera_format = camera.camera_format();
    tracing::info!(
        "Webcam opened: {}x{} @ {}fps, format={:?}",
        camera_format.resolution().width(),
        camera_format.resolution().height(),
        camera_format.frame_rate(),
        camera_format.format()
    );

    let mut frame_index: u64 = 0;
    let mut dropped: u64 = 0;

    while running.load(Ordering::SeqCst) {
        // Blocks until the camera delivers the next frame
        let frame = match camera.frame() {
            Ok(buffer) => buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| CaptureError::Decode(e.to_string()))
                .and_then(|image| {
                    let (width, height) = (image.width(), image.height());
                    Frame::new(frame_index, width, height, PixelFormat::Rgb8, image.into_raw())
                }),
            Err(e) => {
                tracing::debug!("Failed to capture frame: {:?}", e);
                continue;
            }
        };
        frame_index += 1;

        match tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => dropped += 1,
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Error stopping camera stream: {:?}", e);
    }

    tracing::info!(
        "Webcam capture thread stopped after {} frames ({} dropped)",
        frame_index,
        dropped
    );
}

#[async_trait]
impl FrameSource for WebcamFrameSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_frame(&mut self) -> CaptureResult<Frame> {
        self.frames.recv().await.unwrap_or(Err(CaptureError::Closed))
    }
}

impl Drop for WebcamFrameSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // The thread notices on its next frame; don't block the dropping task
        drop(self.capture_thread.take());
    }
}
