//! PNG directory frame source
//!
//! Replays the `.png` files of a directory as an endless video stream, in
//! file name order, starting over after the last file. Useful for running
//! the classifier without a camera and for reproducible sessions.

use super::traits::{CaptureError, CaptureResult, Frame, FrameSource, PixelFormat};
use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Frame source cycling over PNG files
pub struct PngDirectorySource {
    id: String,
    files: Vec<PathBuf>,
    cursor: usize,
    next_index: u64,
}

impl PngDirectorySource {
    /// Scan a directory for PNG files
    pub fn open(dir: &Path) -> CaptureResult<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| ext.eq_ignore_ascii_case("png"))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::Device(format!(
                "No PNG frames found in {:?}",
                dir
            )));
        }

        tracing::info!("Replaying {} PNG frames from {:?}", files.len(), dir);

        Ok(Self {
            id: format!("png:{}", dir.display()),
            files,
            cursor: 0,
            next_index: 0,
        })
    }

    /// Number of distinct frames in one cycle
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FrameSource for PngDirectorySource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_frame(&mut self) -> CaptureResult<Frame> {
        let path = &self.files[self.cursor];
        self.cursor = (self.cursor + 1) % self.files.len();

        let bytes = tokio::fs::read(path).await?;
        let (width, height, format, data) = decode_png(&bytes)
            .map_err(|e| CaptureError::Decode(format!("{:?}: {}", path, e)))?;

        let index = self.next_index;
        self.next_index += 1;
        Frame::new(index, width, height, format, data)
    }
}

/// Decode PNG bytes into 8-bit pixels
pub fn decode_png(bytes: &[u8]) -> CaptureResult<(u32, u32, PixelFormat, Vec<u8>)> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

    let mut reader = decoder
        .read_info()
        .map_err(|e| CaptureError::Decode(e.to_string()))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| CaptureError::Decode(e.to_string()))?;
    buf.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(CaptureError::Decode(format!(
            "unsupported bit depth {:?}",
            info.bit_depth
        )));
    }

    let format = match info.color_type {
        png::ColorType::Grayscale => PixelFormat::Gray8,
        png::ColorType::GrayscaleAlpha => PixelFormat::GrayAlpha8,
        png::ColorType::Rgb => PixelFormat::Rgb8,
        png::ColorType::Rgba => PixelFormat::Rgba8,
        other => {
            return Err(CaptureError::Decode(format!(
                "unsupported color type {:?}",
                other
            )))
        }
    };

    Ok((info.width, info.height, format, buf))
}
