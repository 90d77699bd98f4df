use std::time::Instant;

use digit_scope::{CanvasRect, PointerEvent};
use serde::Deserialize;
use tiny_http::Request;

use crate::routes::{bad_request, json_response, read_body, Reply};
use crate::state::SketchpadState;

/// One forwarded pointer or touch event plus where the canvas sat on screen
/// when it happened.
#[derive(Debug, Deserialize)]
struct InputMessage {
    event: PointerEvent,
    rect: CanvasRect,
}

/// `POST /input`
///
/// Body: `{"event":{"kind":"mouse_move","client":{"x":..,"y":..}},"rect":{..}}`.
/// Replies with whether the page should suppress the default action.
pub fn handle(request: &mut Request, state: &mut SketchpadState) -> Reply {
    let body = match read_body(request) {
        Ok(b) => b,
        Err(reply) => return reply,
    };
    let msg: InputMessage = match serde_json::from_str(&body) {
        Ok(m) => m,
        Err(e) => return bad_request(&format!("invalid input event: {}", e)),
    };

    let outcome = state.app.handle_input(&msg.event, &msg.rect, Instant::now());
    let moved = matches!(msg.event, PointerEvent::MouseMove { .. } | PointerEvent::TouchMove { .. });
    if outcome.ticket.is_some() || !moved {
        state.submit(outcome.ticket);
    }

    json_response(format!(r#"{{"prevent_default":{}}}"#, outcome.prevent_default))
}
