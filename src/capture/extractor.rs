//! Pooled-pixel feature extraction
//!
//! A lightweight stand-in for a pretrained embedding model: the frame is
//! split into a `grid x grid` lattice and each cell is reduced to its mean
//! intensity per channel. Good enough to tell apart scenes that differ in
//! layout and color, and cheap enough to run on every frame.

use super::traits::{CaptureError, CaptureResult, FeatureExtractor, Frame};
use crate::classifier::FeatureVector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Largest accepted lattice side
pub const MAX_GRID_SIZE: u32 = 256;

/// Extractor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractorConfig {
    /// Cells per side of the pooling lattice
    pub grid_size: u32,

    /// Pool luma only instead of red, green and blue
    pub grayscale: bool,

    /// Scale each vector to unit length
    pub normalize: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            grid_size: 8,
            grayscale: false,
            normalize: true,
        }
    }
}

/// Box-average pooling extractor
#[derive(Debug, Clone)]
pub struct PooledPixelExtractor {
    config: ExtractorConfig,
}

impl PooledPixelExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn channels(&self) -> usize {
        if self.config.grayscale {
            1
        } else {
            3
        }
    }
}

#[async_trait]
impl FeatureExtractor for PooledPixelExtractor {
    fn dimension(&self) -> usize {
        let grid = self.config.grid_size as usize;
        grid * grid * self.channels()
    }

    async fn extract(&self, frame: &Frame) -> CaptureResult<FeatureVector> {
        let mut components = pool_frame(frame, self.config.grid_size, self.config.grayscale)?;
        if self.config.normalize {
            l2_normalize(&mut components);
        }
        FeatureVector::new(components).map_err(|e| CaptureError::Extraction(e.to_string()))
    }
}

/// Average each lattice cell of a frame.
///
/// Cells are laid out row-major; with color enabled each cell contributes
/// red, green and blue means in that order. Values are scaled to 0.0-1.0.
fn pool_frame(frame: &Frame, grid: u32, grayscale: bool) -> CaptureResult<Vec<f32>> {
    if grid == 0 || grid > MAX_GRID_SIZE {
        return Err(CaptureError::Extraction(format!(
            "grid size must be between 1 and {}, got {}",
            MAX_GRID_SIZE, grid
        )));
    }

    let channels = if grayscale { 1 } else { 3 };
    let mut pooled = Vec::with_capacity(grid as usize * grid as usize * channels);

    for gy in 0..grid {
        let (y0, y1) = cell_span(gy, grid, frame.height());
        for gx in 0..grid {
            let (x0, x1) = cell_span(gx, grid, frame.width());

            let mut sums = [0.0f64; 3];
            let mut count = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    let rgb = pixel_rgb(frame, x, y);
                    for (sum, value) in sums.iter_mut().zip(rgb) {
                        *sum += value as f64;
                    }
                    count += 1;
                }
            }

            let mean = |sum: f64| (sum / count as f64 / 255.0) as f32;
            if grayscale {
                pooled.push(mean(0.299 * sums[0] + 0.587 * sums[1] + 0.114 * sums[2]));
            } else {
                pooled.extend(sums.iter().map(|&s| mean(s)));
            }
        }
    }

    Ok(pooled)
}

/// Pixel range covered by lattice cell `cell`; never empty
fn cell_span(cell: u32, grid: u32, extent: u32) -> (u32, u32) {
    let start = (cell as u64 * extent as u64 / grid as u64) as u32;
    let end = ((cell as u64 + 1) * extent as u64 / grid as u64) as u32;
    let start = start.min(extent - 1);
    (start, end.max(start + 1))
}

/// Color of a pixel as red, green and blue; alpha is ignored
fn pixel_rgb(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
    let pixel = frame.pixel(x, y);
    if frame.format().is_color() {
        [pixel[0], pixel[1], pixel[2]]
    } else {
        [pixel[0]; 3]
    }
}

fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value = (*value as f64 / norm) as f32;
        }
    }
}
