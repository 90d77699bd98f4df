use std::io::{Cursor, Read};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::handlers;
use crate::state::SketchpadState;

pub type Reply = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn with_body(status: u16, content_type: &str, bytes: Vec<u8>) -> Reply {
    let len = bytes.len();
    let mut headers = Vec::new();
    if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        headers.push(h);
    }
    if let Ok(h) = Header::from_bytes(&b"Cache-Control"[..], &b"no-store"[..]) {
        headers.push(h);
    }
    Response::new(StatusCode(status), headers, Cursor::new(bytes), Some(len), None)
}

pub fn html_response(body: String) -> Reply {
    with_body(200, "text/html; charset=utf-8", body.into_bytes())
}

pub fn json_response(body: String) -> Reply {
    with_body(200, "application/json", body.into_bytes())
}

pub fn png_response(bytes: Vec<u8>) -> Reply {
    with_body(200, "image/png", bytes)
}

pub fn no_content() -> Reply {
    with_body(204, "text/plain", Vec::new())
}

pub fn bad_request(reason: &str) -> Reply {
    with_body(400, "text/plain; charset=utf-8", reason.as_bytes().to_vec())
}

pub fn server_error(reason: &str) -> Reply {
    with_body(500, "text/plain; charset=utf-8", reason.as_bytes().to_vec())
}

pub fn not_found() -> Reply {
    with_body(404, "text/plain", b"404 Not Found".to_vec())
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Routes one request. Runs on the event-loop thread and must not block;
/// the only long-lived route, `/events`, hands its socket to the state
/// instead of looping here.
pub fn dispatch(mut request: Request, state: &mut SketchpadState) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let path = url.split('?').next().unwrap_or("").to_owned();

    if method == Method::Get && path == "/events" {
        handlers::events::handle(request, state);
        return;
    }

    let response = match (method, path.as_str()) {
        (Method::Get, "/") => html_response(crate::render::render_page(&state.app)),
        (Method::Get, "/canvas.png") => handlers::controls::handle_canvas_png(state),

        (Method::Post, "/input") => handlers::input::handle(&mut request, state),
        (Method::Post, "/clear") => handlers::controls::handle_clear(state),
        (Method::Post, "/predict") => handlers::controls::handle_predict(state),
        (Method::Post, "/brush") => handlers::controls::handle_brush(&mut request, state),
        (Method::Post, "/resize") => handlers::controls::handle_resize(&mut request, state),

        _ => not_found(),
    };

    let _ = request.respond(response);
}

/// Reads the whole request body as UTF-8.
pub fn read_body(request: &mut Request) -> Result<String, Reply> {
    let mut body = String::new();
    request
        .as_reader()
        .read_to_string(&mut body)
        .map(|_| body)
        .map_err(|e| bad_request(&format!("unreadable body: {}", e)))
}
