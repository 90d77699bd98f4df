//! Color and weight encoding of activations.
//!
//! Node appearance is a pure function of activation magnitude, split into
//! three bands: dim below 0.1, warm (amber) up to and including 0.5, and
//! cool (teal) above, where the halo widens past 0.75.

use super::scene::{GradientStop, Glow, Rgba};

pub const HOT: Rgba = Rgba::rgb(232, 164, 74);
pub const HOT_GLOW: Rgba = Rgba::rgba(232, 164, 74, 0.55);
pub const COOL: Rgba = Rgba::rgb(62, 201, 167);
pub const COOL_GLOW: Rgba = Rgba::rgba(62, 201, 167, 0.45);
pub const DIM: Rgba = Rgba::rgb(46, 44, 40);
pub const DIM_STROKE: Rgba = Rgba::rgb(78, 75, 71);
pub const BACKGROUND: Rgba = Rgba::rgb(14, 17, 13);
pub const TEXT: Rgba = Rgba::rgb(240, 235, 225);
pub const TEXT_DIM: Rgba = Rgba::rgb(145, 140, 130);
pub const RETICLE: Rgba = Rgba::rgba(240, 235, 225, 0.03);

pub const DIM_BELOW: f64 = 0.1;
pub const WARM_MAX: f64 = 0.5;
/// Cool-band magnitude above which the halo starts to grow.
pub const GLOW_RAMP_FROM: f64 = 0.75;
pub const WARM_GLOW_BLUR: f64 = 7.0;
pub const COOL_GLOW_BLUR: f64 = 12.0;
pub const COOL_GLOW_BLUR_MAX: f64 = 20.0;
/// Output labels turn dark above this magnitude.
pub const LABEL_INVERT_ABOVE: f64 = 0.3;

/// Connections with an endpoint or opacity below this are not drawn.
pub const NOISE_FLOOR: f64 = 0.04;
pub const EDGE_OPACITY_CAP: f64 = 0.55;
pub const EDGE_OPACITY_GAIN: f64 = 0.8;
pub const EDGE_WIDTH_MIN: f64 = 0.4;
pub const EDGE_WIDTH_GAIN: f64 = 2.0;
/// Opacity of the end stops relative to the middle stop.
pub const EDGE_END_STOP_RATIO: f64 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeBand {
    Dim,
    Warm,
    Cool,
}

/// Non-finite activations read as zero.
pub fn magnitude(activation: f64) -> f64 {
    if activation.is_finite() { activation.abs() } else { 0.0 }
}

pub fn band(activation: f64) -> NodeBand {
    let m = magnitude(activation);
    if m < DIM_BELOW {
        NodeBand::Dim
    } else if m <= WARM_MAX {
        NodeBand::Warm
    } else {
        NodeBand::Cool
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStyle {
    pub band: NodeBand,
    pub fill: Rgba,
    pub stroke: Rgba,
    pub glow: Option<Glow>,
}

pub fn node_style(activation: f64) -> NodeStyle {
    let m = magnitude(activation);
    match band(activation) {
        NodeBand::Dim => NodeStyle { band: NodeBand::Dim, fill: DIM, stroke: DIM_STROKE, glow: None },
        NodeBand::Warm => {
            let t = m / WARM_MAX;
            NodeStyle {
                band: NodeBand::Warm,
                fill: HOT.with_alpha(0.35 + t * 0.5),
                stroke: HOT,
                glow: Some(Glow { color: HOT_GLOW, blur: WARM_GLOW_BLUR }),
            }
        }
        NodeBand::Cool => {
            let t = m.min(1.0);
            let ramp = ((m - GLOW_RAMP_FROM) / (1.0 - GLOW_RAMP_FROM)).clamp(0.0, 1.0);
            NodeStyle {
                band: NodeBand::Cool,
                fill: COOL.with_alpha(0.55 + t * 0.45),
                stroke: COOL,
                glow: Some(Glow {
                    color: COOL_GLOW,
                    blur: COOL_GLOW_BLUR + ramp * (COOL_GLOW_BLUR_MAX - COOL_GLOW_BLUR),
                }),
            }
        }
    }
}

pub fn label_color(activation: f64) -> Rgba {
    if magnitude(activation) > LABEL_INVERT_ABOVE { BACKGROUND } else { TEXT }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStyle {
    pub strength: f64,
    pub opacity: f64,
    pub width: f64,
    pub stops: [GradientStop; 3],
}

/// Style of the connection between two nodes, or `None` when it falls
/// under the noise floor.
pub fn edge_style(source: f64, target: f64) -> Option<EdgeStyle> {
    let (sa, ta) = (magnitude(source), magnitude(target));
    if sa < NOISE_FLOOR || ta < NOISE_FLOOR {
        return None;
    }
    let strength = (sa * ta).sqrt();
    let opacity = (strength * EDGE_OPACITY_GAIN).min(EDGE_OPACITY_CAP);
    if opacity < NOISE_FLOOR {
        return None;
    }
    let end = HOT.with_alpha(opacity * EDGE_END_STOP_RATIO);
    Some(EdgeStyle {
        strength,
        opacity,
        width: (strength * EDGE_WIDTH_GAIN).max(EDGE_WIDTH_MIN),
        stops: [
            GradientStop { offset: 0.0, color: end },
            GradientStop { offset: 0.5, color: COOL.with_alpha(opacity) },
            GradientStop { offset: 1.0, color: end },
        ],
    })
}
