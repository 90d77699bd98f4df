use std::io::Write;
use std::time::{Duration, Instant};

use digit_scope::{AppContext, InferenceWorker, PredictionTicket};
use tracing::debug;

use crate::render;
use crate::util::sse::{format_sse_event, format_sse_keepalive, write_sse};

/// Poll interval while a prediction is in flight.
const BUSY_POLL: Duration = Duration::from_millis(15);
/// Longest the loop sleeps when nothing is scheduled.
const IDLE_POLL: Duration = Duration::from_millis(500);
const KEEPALIVE_EVERY: Duration = Duration::from_secs(15);

/// An open `/events` stream.
pub type Subscriber = Box<dyn Write + Send>;

/// Everything the event loop owns. Only the loop thread touches it, so no
/// locking is involved; inference runs on worker threads and reports back
/// through the worker's channel.
pub struct SketchpadState {
    pub app: AppContext,
    worker: InferenceWorker,
    subscribers: Vec<Subscriber>,
    /// The page needs a fresh display frame.
    dirty: bool,
    last_push: Instant,
}

impl SketchpadState {
    pub fn new(app: AppContext, worker: InferenceWorker) -> Self {
        SketchpadState {
            app,
            worker,
            subscribers: Vec::new(),
            dirty: true,
            last_push: Instant::now(),
        }
    }

    pub fn submit(&mut self, ticket: Option<PredictionTicket>) {
        if let Some(ticket) = ticket {
            self.worker.submit(ticket);
        }
        self.dirty = true;
    }

    /// Runs a readiness handshake on the worker; `pump` applies the outcome.
    pub fn retry_handshake(&mut self) {
        self.worker.submit_handshake();
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// How long the loop may block waiting for the next request.
    pub fn poll_interval(&self, now: Instant) -> Duration {
        let mut wait = IDLE_POLL;
        if self.app.is_waiting() || self.app.is_connecting() {
            wait = wait.min(BUSY_POLL);
        }
        if let Some(deadline) = self.app.next_deadline(now) {
            wait = wait.min(deadline);
        }
        wait
    }

    /// Applies finished handshakes and predictions, fires timers and pushes
    /// display updates to every open stream.
    pub fn pump(&mut self, now: Instant) {
        for online in self.worker.drain_handshakes() {
            self.app.complete_handshake(online);
            self.dirty = true;
        }
        for (id, result) in self.worker.drain() {
            if self.app.complete_prediction(id, result, now) {
                self.dirty = true;
            }
        }

        let was_waiting = self.app.is_waiting();
        let ticket = self.app.tick(now);
        if was_waiting && !self.app.is_waiting() {
            // Timed out.
            self.dirty = true;
        }
        if ticket.is_some() {
            self.submit(ticket);
        }

        if self.dirty {
            self.dirty = false;
            self.broadcast(now);
        } else if now.saturating_duration_since(self.last_push) >= KEEPALIVE_EVERY {
            self.push(format_sse_keepalive(), now);
        }
    }

    /// Adopts a new stream and sends it the current display right away.
    pub fn subscribe(&mut self, mut subscriber: Subscriber, now: Instant) {
        let frame = format_sse_event("display", &render::display_json(&self.app, now));
        if write_sse(&mut subscriber, &frame) {
            self.subscribers.push(subscriber);
            debug!(open = self.subscribers.len(), "display stream opened");
        }
    }

    fn broadcast(&mut self, now: Instant) {
        if self.subscribers.is_empty() {
            return;
        }
        let frame = format_sse_event("display", &render::display_json(&self.app, now));
        self.push(&frame, now);
    }

    fn push(&mut self, frame: &str, now: Instant) {
        let before = self.subscribers.len();
        self.subscribers.retain_mut(|s| write_sse(s, frame));
        if self.subscribers.len() < before {
            debug!(closed = before - self.subscribers.len(), "display streams closed");
        }
        self.last_push = now;
    }
}
