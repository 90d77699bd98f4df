use std::time::Instant;

use digit_scope::Viewport;
use serde::Deserialize;
use tiny_http::Request;
use tracing::warn;

use crate::routes::{bad_request, json_response, no_content, png_response, read_body, server_error, Reply};
use crate::state::SketchpadState;
use crate::util::form::{form_get, parse_form};

// ---------------------------------------------------------------------------
// POST /clear
// ---------------------------------------------------------------------------

pub fn handle_clear(state: &mut SketchpadState) -> Reply {
    state.app.clear();
    state.mark_dirty();
    no_content()
}

// ---------------------------------------------------------------------------
// POST /predict
// ---------------------------------------------------------------------------

/// Manual trigger. Doubles as the retry control while offline.
pub fn handle_predict(state: &mut SketchpadState) -> Reply {
    let outcome = state.app.manual_predict(Instant::now());
    if outcome.retry_handshake {
        state.retry_handshake();
    }
    state.submit(outcome.ticket);
    no_content()
}

// ---------------------------------------------------------------------------
// POST /brush   (form: size=NN)
// ---------------------------------------------------------------------------

pub fn handle_brush(request: &mut Request, state: &mut SketchpadState) -> Reply {
    let body = match read_body(request) {
        Ok(b) => b,
        Err(reply) => return reply,
    };
    let pairs = parse_form(&body);
    let size = match form_get(&pairs, "size").map(|v| v.trim().parse::<u32>()) {
        Some(Ok(size)) => size,
        _ => return bad_request("expected size=<integer>"),
    };
    let applied = state.app.set_brush_size(size);
    state.mark_dirty();
    json_response(format!(r#"{{"size":{}}}"#, applied))
}

// ---------------------------------------------------------------------------
// POST /resize
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ResizeMessage {
    width: f64,
    height: f64,
    #[serde(default = "unit_ratio")]
    dpr: f64,
}

fn unit_ratio() -> f64 {
    1.0
}

/// The page reports its visualization container whenever it changes size.
pub fn handle_resize(request: &mut Request, state: &mut SketchpadState) -> Reply {
    let body = match read_body(request) {
        Ok(b) => b,
        Err(reply) => return reply,
    };
    let msg: ResizeMessage = match serde_json::from_str(&body) {
        Ok(m) => m,
        Err(e) => return bad_request(&format!("invalid resize: {}", e)),
    };
    state.app.resize(Viewport::new(msg.width, msg.height, msg.dpr));
    state.mark_dirty();
    no_content()
}

// ---------------------------------------------------------------------------
// GET /canvas.png
// ---------------------------------------------------------------------------

pub fn handle_canvas_png(state: &SketchpadState) -> Reply {
    match state.app.stroke().canvas().to_png() {
        Ok(bytes) => png_response(bytes),
        Err(e) => {
            warn!(error = %e, "PNG export failed");
            server_error("could not encode the drawing")
        }
    }
}
