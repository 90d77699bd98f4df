//! Layer diagram of the classifier, driven by the latest activation snapshot.
//!
//! The visualizer is either `Empty` (idle nodes plus a caption) or
//! `Populated` with the network state of the last accepted prediction.
//! Every `render` re-derives the layout from the current viewport; no
//! geometry is cached between passes.

pub mod layout;
pub mod scene;
pub mod style;
pub mod svg;

pub use layout::{representative_indices, ColumnLayout, Layout, NodePosition};
pub use scene::{Paint, Rgba, Scene, Shape};
pub use style::{band, NodeBand};

use crate::canvas::Point2D;
use crate::inference::{ActivationSnapshot, LayerId, NetworkArchitecture, NetworkState};

use scene::{TextAlign, TextStyle};

pub const EMPTY_CAPTION: &str = "Draw a digit to see activations";
const RETICLE_STEP: f64 = 28.0;
/// Largest container edge accepted from the page, in CSS pixels.
pub const MAX_VIEWPORT_EDGE: f64 = 16384.0;
const MAX_PIXEL_RATIO: f64 = 8.0;
const MONO: &str = "'IBM Plex Mono', monospace";
const SANS: &str = "'DM Sans', sans-serif";

/// Container size in CSS pixels plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl Viewport {
    /// Non-finite or negative edges become 0 and oversized ones are clamped
    /// to `MAX_VIEWPORT_EDGE`.
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        let clean = |v: f64| if v.is_finite() && v > 0.0 { v.min(MAX_VIEWPORT_EDGE) } else { 0.0 };
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio.min(MAX_PIXEL_RATIO)
        } else {
            1.0
        };
        Viewport { width: clean(width), height: clean(height), device_pixel_ratio: dpr }
    }

    /// Backing-store size of a canvas fitted to this viewport.
    pub fn backing_size(&self) -> (u32, u32) {
        (
            (self.width * self.device_pixel_ratio).round() as u32,
            (self.height * self.device_pixel_ratio).round() as u32,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualState {
    Empty,
    Populated(NetworkState),
}

/// Output of one render pass. Scene coordinates are CSS pixels; `scale`
/// maps them onto the backing store.
#[derive(Debug, Clone)]
pub struct Frame {
    pub viewport: Viewport,
    pub backing_width: u32,
    pub backing_height: u32,
    pub scale: f64,
    pub layout: Layout,
    pub scene: Scene,
}

pub struct NetworkVisualizer {
    viewport: Viewport,
    state: VisualState,
    /// Architecture used for the idle diagram; follows the last populated state.
    idle_architecture: NetworkArchitecture,
}

impl NetworkVisualizer {
    pub fn new(viewport: Viewport) -> Self {
        NetworkVisualizer {
            viewport,
            state: VisualState::Empty,
            idle_architecture: NetworkArchitecture::fixed(),
        }
    }

    pub fn state(&self) -> &VisualState {
        &self.state
    }

    pub fn is_populated(&self) -> bool {
        matches!(self.state, VisualState::Populated(_))
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Replaces the displayed snapshot wholesale.
    pub fn populate(&mut self, state: NetworkState) {
        self.idle_architecture = state.architecture.clone();
        self.state = VisualState::Populated(state);
    }

    pub fn clear(&mut self) {
        self.state = VisualState::Empty;
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn render(&self) -> Frame {
        let vp = self.viewport;
        let (backing_width, backing_height) = vp.backing_size();
        let (architecture, activations) = match &self.state {
            VisualState::Populated(s) => (&s.architecture, Some(&s.activations)),
            VisualState::Empty => (&self.idle_architecture, None),
        };
        let layout = Layout::compute(architecture, vp.width, vp.height);

        let mut scene = Scene::new();
        draw_background(&mut scene, vp.width, vp.height);
        if let Some(acts) = activations {
            draw_connections(&mut scene, &layout, acts);
        }
        draw_nodes(&mut scene, &layout, activations);
        draw_layer_labels(&mut scene, &layout, architecture);
        if activations.is_none() && !layout.columns.is_empty() {
            scene.push(Shape::Text {
                at: Point2D::new(vp.width / 2.0, 20.0_f64.min(vp.height * 0.05)),
                text: EMPTY_CAPTION.to_owned(),
                style: TextStyle { color: style::TEXT_DIM, size: 11.0, weight: 500, family: SANS, align: TextAlign::Center },
            });
        }

        Frame { viewport: vp, backing_width, backing_height, scale: vp.device_pixel_ratio, layout, scene }
    }
}

fn draw_background(scene: &mut Scene, width: f64, height: f64) {
    scene.push(Shape::Rect { x: 0.0, y: 0.0, width, height, fill: style::BACKGROUND });
    let reticle = |from: Point2D, to: Point2D| Shape::Line { from, to, stroke: Paint::Solid(style::RETICLE), width: 0.5 };
    let mut x = 0.0;
    while x < width {
        scene.push(reticle(Point2D::new(x, 0.0), Point2D::new(x, height)));
        x += RETICLE_STEP;
    }
    let mut y = 0.0;
    while y < height {
        scene.push(reticle(Point2D::new(0.0, y), Point2D::new(width, y)));
        y += RETICLE_STEP;
    }
}

/// Connections are drawn back to front: the output-facing pair first, the
/// input-facing pair last.
fn draw_connections(scene: &mut Scene, layout: &Layout, acts: &ActivationSnapshot) {
    let pairs = layout.columns.len().min(LayerId::ALL.len()).saturating_sub(1);
    for li in (0..pairs).rev() {
        let (src_id, tgt_id) = (LayerId::ALL[li], LayerId::ALL[li + 1]);
        let (Some(src_acts), Some(tgt_acts)) = (acts.get(src_id), acts.get(tgt_id)) else {
            continue;
        };
        let value = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0);

        for sp in &layout.columns[li].nodes {
            let sa = value(src_acts, sp.source_index);
            if style::magnitude(sa) < style::NOISE_FLOOR {
                continue;
            }
            for tp in &layout.columns[li + 1].nodes {
                let Some(edge) = style::edge_style(sa, value(tgt_acts, tp.source_index)) else {
                    continue;
                };
                let (from, to) = (Point2D::new(sp.x, sp.y), Point2D::new(tp.x, tp.y));
                scene.push(Shape::Line {
                    from,
                    to,
                    stroke: Paint::Linear { from, to, stops: edge.stops.to_vec() },
                    width: edge.width,
                });
            }
        }
    }
}

fn draw_nodes(scene: &mut Scene, layout: &Layout, acts: Option<&ActivationSnapshot>) {
    for (li, column) in layout.columns.iter().enumerate() {
        let id = LayerId::ALL.get(li).copied();
        for node in &column.nodes {
            let activation = match (acts, id) {
                (Some(a), Some(id)) => a.value(id, node.source_index),
                _ => 0.0,
            };
            let ns = style::node_style(activation);
            let center = Point2D::new(node.x, node.y);
            scene.push(Shape::Circle {
                center,
                radius: column.radius,
                fill: ns.fill,
                stroke: ns.stroke,
                stroke_width: 1.2_f64.min(column.radius * 0.5),
                glow: ns.glow,
            });
            if column.is_output {
                scene.push(Shape::Text {
                    at: center,
                    text: node.source_index.to_string(),
                    style: TextStyle {
                        color: style::label_color(activation),
                        size: 10.0_f64.min(column.radius * 1.3),
                        weight: 700,
                        family: MONO,
                        align: TextAlign::Center,
                    },
                });
            }
        }
    }
}

fn draw_layer_labels(scene: &mut Scene, layout: &Layout, architecture: &NetworkArchitecture) {
    for (column, layer) in layout.columns.iter().zip(&architecture.layers) {
        scene.push(Shape::Text {
            at: Point2D::new(column.x, layout.name_y),
            text: layer.name.clone(),
            style: TextStyle { color: style::TEXT_DIM, size: 9.0, weight: 600, family: MONO, align: TextAlign::Center },
        });
        scene.push(Shape::Text {
            at: Point2D::new(column.x, layout.size_y),
            text: format!("{} n", layer.size),
            style: TextStyle { color: style::TEXT_DIM, size: 8.0, weight: 400, family: MONO, align: TextAlign::Center },
        });
    }
}
