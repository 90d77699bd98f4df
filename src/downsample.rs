/// Resamples the drawing raster into the 28×28 grid the classifier consumes.

use image::imageops::{self, FilterType};

use crate::canvas::DrawingCanvas;

pub const GRID_SIDE: u32 = 28;
pub const GRID_LEN: usize = (GRID_SIDE * GRID_SIDE) as usize;

/// Grids whose summed intensity falls below this are treated as blank.
pub const EMPTY_THRESHOLD: f64 = 3.0;

/// Row-major 28×28 intensities in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    values: Vec<f64>,
}

impl PixelGrid {
    /// Wraps raw intensities. Returns `None` unless exactly `GRID_LEN` values
    /// are given; values are clamped to [0, 1].
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.len() != GRID_LEN {
            return None;
        }
        Some(PixelGrid { values: values.into_iter().map(|v| v.clamp(0.0, 1.0)).collect() })
    }

    pub fn blank() -> Self {
        PixelGrid { values: vec![0.0; GRID_LEN] }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn is_near_empty(&self) -> bool {
        self.sum() < EMPTY_THRESHOLD
    }

    /// Grayscale level for every cell of the preview swatch grid.
    pub fn preview(&self) -> PixelPreview {
        PixelPreview { cells: self.values.iter().map(|v| (v * 255.0).floor() as u8).collect() }
    }
}

/// 28×28 grayscale swatches mirroring the grid that was last sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelPreview {
    pub cells: Vec<u8>,
}

impl PixelPreview {
    pub fn black() -> Self {
        PixelPreview { cells: vec![0; GRID_LEN] }
    }

    pub fn is_black(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Downsampler;

impl Downsampler {
    /// Renders the canvas into a 28×28 surface with Lanczos smoothing and
    /// normalizes the (single) channel to [0, 1].
    pub fn downsample(&self, canvas: &DrawingCanvas) -> PixelGrid {
        let small = imageops::resize(canvas.image(), GRID_SIDE, GRID_SIDE, FilterType::Lanczos3);
        PixelGrid { values: small.pixels().map(|p| p.0[0] as f64 / 255.0).collect() }
    }
}
