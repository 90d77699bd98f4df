use serde::{Deserialize, Serialize};

use super::{DrawingCanvas, Point2D};

/// Brush slider range (inclusive), in backing pixels.
pub const BRUSH_MIN: u32 = 4;
pub const BRUSH_MAX: u32 = 40;
pub const BRUSH_DEFAULT: u32 = 20;

/// On-screen bounding rectangle of the drawing canvas in CSS pixels,
/// as reported by `getBoundingClientRect()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasRect {
    /// Maps a client coordinate onto the canvas backing resolution.
    ///
    /// A degenerate (zero-sized) rect maps with a scale of 1 so that a hidden
    /// canvas never produces non-finite coordinates.
    pub fn to_canvas(&self, client: Point2D, backing_width: u32, backing_height: u32) -> Point2D {
        let sx = if self.width > 0.0 { backing_width as f64 / self.width } else { 1.0 };
        let sy = if self.height > 0.0 { backing_height as f64 / self.height } else { 1.0 };
        Point2D::new((client.x - self.left) * sx, (client.y - self.top) * sy)
    }
}

/// Raw pointer input, already stripped of browser event plumbing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerEvent {
    MouseDown { client: Point2D },
    MouseMove { client: Point2D },
    MouseUp,
    MouseLeave,
    TouchStart { touches: Vec<Point2D> },
    TouchMove { touches: Vec<Point2D> },
    TouchEnd,
}

impl PointerEvent {
    fn is_touch(&self) -> bool {
        matches!(
            self,
            PointerEvent::TouchStart { .. } | PointerEvent::TouchMove { .. } | PointerEvent::TouchEnd
        )
    }
}

/// What a pointer event did to the stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeAction {
    Ignored,
    Started,
    /// A segment was added to an ongoing stroke.
    Extended,
    /// The stroke finished; a prediction is due.
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeEffect {
    pub action: StrokeAction,
    /// Set for touch input so the page does not scroll while drawing.
    pub prevent_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeState {
    pub is_drawing: bool,
    pub last_position: Option<Point2D>,
    pub brush_diameter: u32,
}

/// Turns pointer and touch input into freehand strokes on a `DrawingCanvas`.
pub struct StrokeCapture {
    state: StrokeState,
    canvas: DrawingCanvas,
}

impl StrokeCapture {
    pub fn new(canvas: DrawingCanvas, brush_diameter: u32) -> Self {
        StrokeCapture {
            state: StrokeState {
                is_drawing: false,
                last_position: None,
                brush_diameter: brush_diameter.clamp(BRUSH_MIN, BRUSH_MAX),
            },
            canvas,
        }
    }

    pub fn state(&self) -> &StrokeState {
        &self.state
    }

    pub fn canvas(&self) -> &DrawingCanvas {
        &self.canvas
    }

    /// Current line width used for segments; always the brush diameter.
    pub fn line_width(&self) -> f64 {
        self.state.brush_diameter as f64
    }

    /// Sets the brush diameter, clamped to the slider range. Returns the applied value.
    pub fn set_brush_diameter(&mut self, diameter: u32) -> u32 {
        self.state.brush_diameter = diameter.clamp(BRUSH_MIN, BRUSH_MAX);
        self.state.brush_diameter
    }

    /// Wipes the drawing and abandons any stroke in progress.
    pub fn clear(&mut self) {
        self.canvas.clear();
        self.state.is_drawing = false;
        self.state.last_position = None;
    }

    pub fn handle(&mut self, event: &PointerEvent, rect: &CanvasRect) -> StrokeEffect {
        let prevent_default = event.is_touch();
        let action = match event {
            PointerEvent::MouseDown { client } => self.begin(rect, *client),
            PointerEvent::TouchStart { touches } => match touches.first() {
                Some(t) => self.begin(rect, *t),
                None => StrokeAction::Ignored,
            },
            PointerEvent::MouseMove { client } => self.extend(rect, *client),
            PointerEvent::TouchMove { touches } => match touches.first() {
                Some(t) => self.extend(rect, *t),
                None => StrokeAction::Ignored,
            },
            PointerEvent::MouseUp | PointerEvent::MouseLeave | PointerEvent::TouchEnd => self.end(),
        };
        StrokeEffect { action, prevent_default }
    }

    fn to_canvas(&self, rect: &CanvasRect, client: Point2D) -> Point2D {
        rect.to_canvas(client, self.canvas.width(), self.canvas.height())
    }

    fn begin(&mut self, rect: &CanvasRect, client: Point2D) -> StrokeAction {
        let pos = self.to_canvas(rect, client);
        self.state.is_drawing = true;
        self.state.last_position = Some(pos);
        self.canvas.paint_dot(pos, self.line_width());
        StrokeAction::Started
    }

    fn extend(&mut self, rect: &CanvasRect, client: Point2D) -> StrokeAction {
        if !self.state.is_drawing {
            return StrokeAction::Ignored;
        }
        let pos = self.to_canvas(rect, client);
        let from = self.state.last_position.unwrap_or(pos);
        self.canvas.paint_segment(from, pos, self.line_width());
        self.state.last_position = Some(pos);
        StrokeAction::Extended
    }

    fn end(&mut self) -> StrokeAction {
        if !self.state.is_drawing {
            return StrokeAction::Ignored;
        }
        self.state.is_drawing = false;
        self.state.last_position = None;
        StrokeAction::Ended
    }
}
