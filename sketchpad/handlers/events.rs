use std::time::Instant;

use tiny_http::Request;
use tracing::debug;

use crate::state::SketchpadState;
use crate::util::sse::{write_sse, SSE_HEAD};

/// `GET /events`: display stream.
///
/// Takes the raw socket via `into_writer`, writes the SSE response head and
/// hands the socket to the state, which pushes a `display` frame whenever
/// anything on screen changes. `EventSource` reconnects on its own.
pub fn handle(request: Request, state: &mut SketchpadState) {
    let mut writer = request.into_writer();
    if !write_sse(&mut writer, SSE_HEAD) {
        debug!("display stream closed before the head was written");
        return;
    }
    state.subscribe(writer, Instant::now());
}
