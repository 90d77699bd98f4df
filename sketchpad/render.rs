/// Page and display-frame rendering for the sketchpad.
///
/// The page is a single template (`sketchpad/assets/sketchpad.html`) with
/// `{{TOKEN}}` placeholders filled once at load. Everything that changes
/// afterwards travels as a `display` SSE frame built by `display_json`.

use std::fmt::Write;
use std::time::Instant;

use digit_scope::canvas::raster::CANVAS_SIZE;
use digit_scope::canvas::stroke::{BRUSH_MAX, BRUSH_MIN};
use digit_scope::downsample::{PixelPreview, GRID_SIDE};
use digit_scope::readout::ProbabilityRow;
use digit_scope::visualizer::svg::render_frame;
use digit_scope::AppContext;
use serde::Serialize;

const TEMPLATE: &str = include_str!("assets/sketchpad.html");

pub fn render_page(app: &AppContext) -> String {
    let html = TEMPLATE
        .replace("{{CANVAS_SIZE}}", &CANVAS_SIZE.to_string())
        .replace("{{BRUSH_MIN}}", &BRUSH_MIN.to_string())
        .replace("{{BRUSH_MAX}}", &BRUSH_MAX.to_string())
        .replace("{{BRUSH}}", &app.stroke().state().brush_diameter.to_string())
        .replace("{{BACKEND}}", &html_escape(&app.client().describe()))
        .replace("{{PROB_ROWS}}", &prob_rows_html(&app.readout().rows))
        .replace("{{PREVIEW}}", &preview_html(&app.readout().preview));
    blank_remaining(html)
}

/// Blanks any `{{TOKEN}}` left unfilled.
fn blank_remaining(mut html: String) -> String {
    while let Some(start) = html.find("{{") {
        if let Some(end) = html[start..].find("}}") {
            html.replace_range(start..start + end + 2, "");
        } else {
            break;
        }
    }
    html
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn prob_rows_html(rows: &[ProbabilityRow]) -> String {
    let mut html = String::new();
    for row in rows {
        let winner = if row.winner { " winner" } else { "" };
        let _ = write!(
            html,
            r#"<div class="prob-row"><span class="prob-label{w}" id="prob-label-{i}">{i}</span><div class="prob-track"><div class="prob-bar{w}" id="prob-bar-{i}" style="width:{pct}%"></div></div><span class="prob-value" id="prob-value-{i}">{val}</span></div>"#,
            w = winner,
            i = row.label,
            pct = row.width_pct,
            val = html_escape(&row.value_text),
        );
    }
    html
}

/// 28×28 grid of grayscale swatches.
pub fn preview_html(preview: &PixelPreview) -> String {
    let mut html = format!(r#"<div class="pixel-grid" style="grid-template-columns:repeat({},1fr)">"#, GRID_SIDE);
    for &b in &preview.cells {
        let _ = write!(html, r#"<div class="pixel" style="background:rgb({b},{b},{b})"></div>"#, b = b);
    }
    html.push_str("</div>");
    html
}

#[derive(Serialize)]
struct RowView<'a> {
    width: f64,
    value: &'a str,
    winner: bool,
}

#[derive(Serialize)]
struct DisplayUpdate<'a> {
    status: &'static str,
    led: &'static str,
    digit: &'a str,
    pulse: bool,
    confidence: &'a str,
    high: bool,
    rows: Vec<RowView<'a>>,
    preview: String,
    network: String,
    brush: u32,
    drawing: bool,
}

/// JSON payload of one `display` frame.
pub fn display_json(app: &AppContext, now: Instant) -> String {
    let readout = app.readout();
    let status = app.status();
    let update = DisplayUpdate {
        status: status.label(),
        led: status.led_class(),
        digit: &readout.digit_text,
        pulse: readout.is_highlighted(now),
        confidence: &readout.confidence_text,
        high: readout.high_confidence,
        rows: readout
            .rows
            .iter()
            .map(|r| RowView { width: r.width_pct, value: &r.value_text, winner: r.winner })
            .collect(),
        preview: preview_html(&readout.preview),
        network: render_frame(&app.render()),
        brush: app.stroke().state().brush_diameter,
        drawing: app.stroke().state().is_drawing,
    };
    serde_json::to_string(&update).unwrap_or_else(|_| "{}".to_owned())
}
