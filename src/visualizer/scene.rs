//! Retained drawing primitives produced by one render pass.

use crate::canvas::Point2D;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Rgba { r, g, b, a }
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Rgba { a: a.clamp(0.0, 1.0), ..self }
    }

    pub fn css_rgb(&self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f64,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    /// Gradient along the segment `from → to`, in user space.
    Linear { from: Point2D, to: Point2D, stops: Vec<GradientStop> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub color: Rgba,
    pub blur: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Start,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: Rgba,
    pub size: f64,
    pub weight: u16,
    pub family: &'static str,
    pub align: TextAlign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect { x: f64, y: f64, width: f64, height: f64, fill: Rgba },
    Line { from: Point2D, to: Point2D, stroke: Paint, width: f64 },
    Circle {
        center: Point2D,
        radius: f64,
        fill: Rgba,
        stroke: Rgba,
        stroke_width: f64,
        glow: Option<Glow>,
    },
    Text { at: Point2D, text: String, style: TextStyle },
}

/// Shapes in paint order (first is bottom-most).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    shapes: Vec<Shape>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn circles(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| matches!(s, Shape::Circle { .. }))
    }

    /// Lines drawn with a gradient, i.e. network connections.
    pub fn connections(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| matches!(s, Shape::Line { stroke: Paint::Linear { .. }, .. }))
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
