/// Monochrome drawing surface backing the sketchpad.
///
/// Strokes are painted white on black into an `image::GrayImage`.  Edges get
/// a one-pixel linear coverage ramp so that a stroke of diameter `d` covers
/// exactly `d` pixels worth of intensity across its width, matching what a
/// browser canvas produces with round caps and joins.

use std::io::Cursor;

use image::{GrayImage, ImageOutputFormat, Luma};

use super::Point2D;

/// Backing resolution of the drawing canvas (square).
pub const CANVAS_SIZE: u32 = 280;

#[derive(Debug, Clone)]
pub struct DrawingCanvas {
    image: GrayImage,
}

impl DrawingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        DrawingCanvas { image: GrayImage::new(width, height) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Fills the whole surface with black.
    pub fn clear(&mut self) {
        for p in self.image.pixels_mut() {
            *p = Luma([0]);
        }
    }

    /// Paints a filled disc; used for the first touch of a stroke so taps leave a dot.
    pub fn paint_dot(&mut self, center: Point2D, diameter: f64) {
        self.paint_segment(center, center, diameter);
    }

    /// Paints a line segment with round caps.
    pub fn paint_segment(&mut self, from: Point2D, to: Point2D, diameter: f64) {
        let r = diameter / 2.0;
        if r <= 0.0 {
            return;
        }
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let x0 = ((from.x.min(to.x) - r - 1.0).floor() as i64).max(0);
        let x1 = ((from.x.max(to.x) + r + 1.0).ceil() as i64).min(w - 1);
        let y0 = ((from.y.min(to.y) - r - 1.0).floor() as i64).max(0);
        let y1 = ((from.y.max(to.y) + r + 1.0).ceil() as i64).min(h - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }

        for py in y0..=y1 {
            for px in x0..=x1 {
                let center = Point2D::new(px as f64 + 0.5, py as f64 + 0.5);
                let d = distance_to_segment(center, from, to);
                let coverage = (r + 0.5 - d).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let value = (coverage * 255.0).round() as u8;
                let pixel = self.image.get_pixel_mut(px as u32, py as u32);
                // Overlapping segments of one stroke must not brighten each other.
                if value > pixel.0[0] {
                    pixel.0[0] = value;
                }
            }
        }
    }

    /// Intensity of one pixel in [0, 1].
    pub fn intensity(&self, x: u32, y: u32) -> f64 {
        self.image.get_pixel(x, y).0[0] as f64 / 255.0
    }

    /// Encodes the drawing as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Cursor::new(Vec::new());
        self.image.write_to(&mut out, ImageOutputFormat::Png)?;
        Ok(out.into_inner())
    }
}

impl Default for DrawingCanvas {
    fn default() -> Self {
        DrawingCanvas::new(CANVAS_SIZE, CANVAS_SIZE)
    }
}

fn distance_to_segment(p: Point2D, a: Point2D, b: Point2D) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(Point2D::new(a.x + t * dx, a.y + t * dy))
}
