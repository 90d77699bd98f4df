//! Node placement for the layer diagram.
//!
//! Columns are spaced evenly between fixed side paddings; within a column the
//! drawn slots are spread evenly between top and bottom paddings.  Paddings
//! and radii shrink on small surfaces so nodes stay in bounds and never touch.

use crate::inference::NetworkArchitecture;

pub const SIDE_PAD: f64 = 70.0;
pub const TOP_PAD: f64 = 40.0;
pub const BOTTOM_PAD: f64 = 48.0;
pub const NODE_RADIUS: f64 = 8.0;
pub const OUTPUT_RADIUS_BONUS: f64 = 3.0;

/// Largest share of the bottom padding a radius may take; the lowest nodes
/// must stay above the layer captions.
const BOTTOM_RADIUS_SHARE: f64 = 0.3;

/// Largest share of the gap between neighbours a radius may take.
const RADIUS_SHARE: f64 = 0.45;

/// Source neuron shown by each drawn slot: `floor(slot * size / shown)` where
/// `shown = min(size, display_size)`. Strictly increasing and starting at 0.
pub fn representative_indices(size: usize, display_size: usize) -> Vec<usize> {
    let shown = size.min(display_size);
    (0..shown).map(|slot| slot * size / shown).collect()
}

/// Position of one drawn node. Recomputed every render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
    pub source_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub x: f64,
    pub radius: f64,
    pub is_output: bool,
    pub nodes: Vec<NodePosition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub columns: Vec<ColumnLayout>,
    /// Baselines of the layer name and size captions.
    pub name_y: f64,
    pub size_y: f64,
}

impl Layout {
    pub fn compute(architecture: &NetworkArchitecture, width: f64, height: f64) -> Layout {
        let bottom = BOTTOM_PAD.min(height * 0.12);
        let mut layout = Layout {
            width,
            height,
            columns: Vec::new(),
            name_y: height - bottom * 0.625,
            size_y: height - bottom * 0.375,
        };
        let n = architecture.layers.len();
        if n == 0 || !(width >= 1.0 && height >= 1.0) || !width.is_finite() || !height.is_finite() {
            return layout;
        }

        let side = SIDE_PAD.min(width * 0.125);
        let top = TOP_PAD.min(height * 0.1);
        let column_gap = if n > 1 { (width - 2.0 * side) / (n - 1) as f64 } else { f64::INFINITY };
        let avail = height - top - bottom;

        for (li, layer) in architecture.layers.iter().enumerate() {
            let is_output = li == n - 1;
            let x = if n > 1 { side + column_gap * li as f64 } else { width / 2.0 };
            let indices = representative_indices(layer.size, layer.display_size);
            let shown = indices.len();
            let spacing = if shown > 1 { avail / (shown - 1) as f64 } else { avail };

            let base = if is_output { NODE_RADIUS + OUTPUT_RADIUS_BONUS } else { NODE_RADIUS };
            let mut radius = base
                .min(column_gap * RADIUS_SHARE)
                .min(side * 0.9)
                .min(top * 0.9)
                .min(bottom * BOTTOM_RADIUS_SHARE);
            if shown > 1 {
                radius = radius.min(spacing * RADIUS_SHARE);
            }

            let nodes = indices
                .into_iter()
                .enumerate()
                .map(|(slot, source_index)| NodePosition { x, y: top + slot as f64 * spacing, source_index })
                .collect();
            layout.columns.push(ColumnLayout { x, radius, is_output, nodes });
        }
        layout
    }
}
