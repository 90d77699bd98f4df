use std::io::Write;

// ---------------------------------------------------------------------------
// SSE framing helpers
// ---------------------------------------------------------------------------

/// Response head written before the first frame of a stream. tiny_http's
/// `into_writer()` hands over the raw socket, so the status line and
/// headers are written by hand.
pub const SSE_HEAD: &str = "HTTP/1.1 200 OK\r\n\
                            Content-Type: text/event-stream\r\n\
                            Cache-Control: no-cache\r\n\
                            Connection: keep-alive\r\n\
                            X-Accel-Buffering: no\r\n\
                            \r\n";

/// Formats a named SSE event with a JSON data payload.
///
/// ```text
/// event: <name>\n
/// data: <json>\n
/// \n
/// ```
pub fn format_sse_event(event_name: &str, json_data: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event_name, json_data)
}

/// Keep-alive comment; ignored by `EventSource` clients.
pub fn format_sse_keepalive() -> &'static str {
    ": ping\n\n"
}

/// Writes one frame and flushes. Returns `false` once the client is gone.
pub fn write_sse<W: Write + ?Sized>(writer: &mut W, msg: &str) -> bool {
    writer.write_all(msg.as_bytes()).is_ok() && writer.flush().is_ok()
}
