pub mod raster;
pub mod stroke;

pub use raster::DrawingCanvas;
pub use stroke::{CanvasRect, PointerEvent, StrokeAction, StrokeCapture, StrokeEffect};

use serde::{Deserialize, Serialize};

/// A point in either client (CSS pixel) or canvas (backing pixel) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }

    pub fn distance(&self, other: Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}
