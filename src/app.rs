//! The application context: owns every component and routes input, timer
//! ticks and prediction completions between them.
//!
//! The context never blocks on inference. A prediction is handed out as a
//! `PredictionTicket`; whoever runs it (an `InferenceWorker`, or a test)
//! reports back through `complete_prediction`, where stale results are
//! dropped.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::canvas::{CanvasRect, DrawingCanvas, PointerEvent, StrokeAction, StrokeCapture};
use crate::config::Config;
use crate::downsample::{Downsampler, PixelGrid};
use crate::error::InferenceError;
use crate::inference::{InferenceClient, Prediction};
use crate::pipeline::PredictionTicket;
use crate::readout::{self, ReadoutPanel, Status, StatusIndicator};
use crate::timing::{DebounceTimer, RequestId, RequestSequencer};
use crate::visualizer::{Frame, NetworkVisualizer, Viewport};

/// Result of feeding one pointer event to the context.
#[derive(Debug, Clone)]
pub struct InputOutcome {
    /// The host should suppress the browser default (touch scrolling).
    pub prevent_default: bool,
    pub ticket: Option<PredictionTicket>,
}

/// Result of the predict control.
#[derive(Debug, Clone)]
pub struct PredictOutcome {
    /// Nothing was sent but the backend is not ready: the host should run a
    /// readiness handshake and report it through `complete_handshake`.
    pub retry_handshake: bool,
    pub ticket: Option<PredictionTicket>,
}

pub struct AppContext {
    stroke: StrokeCapture,
    downsampler: Downsampler,
    client: InferenceClient,
    readout: ReadoutPanel,
    status: StatusIndicator,
    visualizer: NetworkVisualizer,
    debounce: DebounceTimer,
    sequencer: RequestSequencer,
    /// Issue time of the request that is currently allowed to land.
    pending_since: Option<Instant>,
    request_timeout: Duration,
    handshake_pending: bool,
}

impl AppContext {
    pub fn new(config: &Config, client: InferenceClient, viewport: Viewport) -> Self {
        AppContext {
            stroke: StrokeCapture::new(DrawingCanvas::default(), config.brush_size),
            downsampler: Downsampler,
            client,
            readout: ReadoutPanel::new(),
            status: StatusIndicator::new(),
            visualizer: NetworkVisualizer::new(viewport),
            debounce: DebounceTimer::new(config.debounce),
            sequencer: RequestSequencer::new(),
            pending_since: None,
            request_timeout: config.request_timeout,
            handshake_pending: false,
        }
    }

    pub fn readout(&self) -> &ReadoutPanel {
        &self.readout
    }

    pub fn status(&self) -> Status {
        self.status.status()
    }

    pub fn stroke(&self) -> &StrokeCapture {
        &self.stroke
    }

    pub fn visualizer(&self) -> &NetworkVisualizer {
        &self.visualizer
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    /// Whether a request is outstanding.
    pub fn is_waiting(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Whether a retry handshake is outstanding.
    pub fn is_connecting(&self) -> bool {
        self.handshake_pending
    }

    /// Time until the next `tick` has work to do, if anything is scheduled.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        let timeout = self
            .pending_since
            .map(|since| (since + self.request_timeout).saturating_duration_since(now));
        match (self.debounce.remaining(now), timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Readiness handshake and initial display. Returns whether the backend is online.
    pub fn startup(&mut self) -> bool {
        self.status.set(Status::Connecting);
        let online = self.client.initialize();
        if online {
            self.status.set(Status::Online);
            self.readout.show_message(readout::DIGIT_PLACEHOLDER, readout::PROMPT);
        } else {
            self.status.set(Status::Offline);
            self.readout.show_message(readout::DIGIT_OFFLINE, readout::OFFLINE_HINT);
        }
        self.visualizer.clear();
        online
    }

    pub fn handle_input(&mut self, event: &PointerEvent, rect: &CanvasRect, now: Instant) -> InputOutcome {
        let effect = self.stroke.handle(event, rect);
        let ticket = match effect.action {
            StrokeAction::Extended => {
                self.debounce.arm(now);
                None
            }
            StrokeAction::Ended => {
                self.debounce.cancel();
                self.request_prediction(now)
            }
            StrokeAction::Started | StrokeAction::Ignored => None,
        };
        InputOutcome { prevent_default: effect.prevent_default, ticket }
    }

    /// Fires the debounce and enforces the request timeout.
    pub fn tick(&mut self, now: Instant) -> Option<PredictionTicket> {
        if let Some(since) = self.pending_since {
            if now.saturating_duration_since(since) >= self.request_timeout {
                if let Some(id) = self.sequencer.retire() {
                    warn!(request = id.0, timeout_ms = self.request_timeout.as_millis() as u64, "prediction timed out");
                }
                self.pending_since = None;
                self.readout.show_error(&InferenceError::TimedOut.to_string());
            }
        }

        if self.debounce.fire_if_due(now) {
            return self.request_prediction(now);
        }
        None
    }

    /// Downsamples the drawing, refreshes the preview and, unless the grid
    /// is near-empty, issues a new request superseding any outstanding one.
    pub fn request_prediction(&mut self, now: Instant) -> Option<PredictionTicket> {
        let grid = self.downsampler.downsample(self.stroke.canvas());
        self.submit_grid(grid, now)
    }

    fn submit_grid(&mut self, grid: PixelGrid, now: Instant) -> Option<PredictionTicket> {
        self.readout.set_preview(grid.preview());
        if grid.is_near_empty() {
            debug!(sum = grid.sum(), "near-empty canvas; skipping prediction");
            return None;
        }
        let id = self.sequencer.issue();
        self.pending_since = Some(now);
        debug!(request = id.0, "prediction requested");
        Some(PredictionTicket { id, grid })
    }

    /// The predict control, which doubles as the retry control while
    /// offline. A prediction re-runs the handshake on its own; when the
    /// canvas is too empty to send, a bare handshake is asked for instead.
    pub fn manual_predict(&mut self, now: Instant) -> PredictOutcome {
        let ticket = self.request_prediction(now);
        let retry_handshake = ticket.is_none() && !self.client.is_ready() && !self.handshake_pending;
        if retry_handshake {
            self.handshake_pending = true;
            self.status.set(Status::Connecting);
            info!("retrying the inference backend");
        }
        PredictOutcome { retry_handshake, ticket }
    }

    /// Applies a handshake asked for by `manual_predict`.
    pub fn complete_handshake(&mut self, online: bool) {
        self.handshake_pending = false;
        if online {
            if self.status.set(Status::Online) {
                info!("inference backend back online");
            }
            let offline_shown = self.readout.digit_text == readout::DIGIT_OFFLINE
                || self.readout.confidence_text == readout::SERVER_OFFLINE;
            if offline_shown {
                self.readout.show_message(readout::DIGIT_PLACEHOLDER, readout::PROMPT);
            }
        } else {
            self.status.set(Status::Offline);
            self.readout.show_error(readout::SERVER_OFFLINE);
        }
    }

    /// Applies a finished request. Returns `false` when the result was stale
    /// and discarded.
    pub fn complete_prediction(&mut self, id: RequestId, result: Result<Prediction, InferenceError>, now: Instant) -> bool {
        if !self.sequencer.accepts(id) {
            debug!(request = id.0, "discarding superseded prediction");
            return false;
        }
        self.sequencer.retire();
        self.pending_since = None;

        match result {
            Ok(prediction) => {
                if self.status.set(Status::Online) {
                    info!("inference backend back online");
                }
                self.readout.show(&prediction, now);
                if let Some(state) = self.client.network_state() {
                    self.visualizer.populate(state);
                }
            }
            Err(e) if e.is_connectivity() => {
                self.status.set(Status::Offline);
                self.readout.show_error(readout::SERVER_OFFLINE);
            }
            Err(e) => self.readout.show_error(&e.to_string()),
        }
        true
    }

    /// Wipes the drawing and every display, abandoning any outstanding request.
    pub fn clear(&mut self) {
        self.stroke.clear();
        self.debounce.cancel();
        if let Some(id) = self.sequencer.retire() {
            debug!(request = id.0, "outstanding prediction abandoned by clear");
        }
        self.pending_since = None;
        self.readout.clear();
        self.visualizer.clear();
    }

    pub fn set_brush_size(&mut self, diameter: u32) -> u32 {
        self.stroke.set_brush_diameter(diameter)
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.visualizer.resize(viewport);
    }

    pub fn render(&self) -> Frame {
        self.visualizer.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Point2D;
    use crate::inference::client::tests::{reply_for, ScriptedBackend};
    use std::sync::atomic::Ordering;

    fn rect() -> CanvasRect {
        CanvasRect { left: 0.0, top: 0.0, width: 280.0, height: 280.0 }
    }

    fn context(backend: ScriptedBackend) -> AppContext {
        AppContext::new(
            &Config::default(),
            InferenceClient::new(Box::new(backend)),
            Viewport::new(800.0, 500.0, 1.0),
        )
    }

    /// Draws a vertical bar and returns the ticket issued at stroke end.
    fn draw_bar(app: &mut AppContext, now: Instant) -> PredictionTicket {
        app.handle_input(&PointerEvent::MouseDown { client: Point2D::new(140.0, 60.0) }, &rect(), now);
        app.handle_input(&PointerEvent::MouseMove { client: Point2D::new(140.0, 220.0) }, &rect(), now);
        app.handle_input(&PointerEvent::MouseUp, &rect(), now).ticket.expect("stroke end issues a prediction")
    }

    fn run(app: &AppContext, ticket: &PredictionTicket) -> Result<Prediction, InferenceError> {
        app.client().predict(ticket.id, &ticket.grid)
    }

    #[test]
    fn startup_reports_online_and_offline() {
        let mut app = context(ScriptedBackend::online());
        assert_eq!(app.status(), Status::Connecting);
        assert!(app.startup());
        assert_eq!(app.status(), Status::Online);
        assert_eq!(app.readout().confidence_text, readout::PROMPT);

        let backend = ScriptedBackend::online();
        backend.online.store(false, Ordering::SeqCst);
        let mut app = context(backend);
        assert!(!app.startup());
        assert_eq!(app.status(), Status::Offline);
        assert_eq!(app.readout().digit_text, readout::DIGIT_OFFLINE);
    }

    #[test]
    fn stroke_end_predicts_and_populates() {
        let mut app = context(ScriptedBackend::online());
        app.startup();
        let now = Instant::now();
        let ticket = draw_bar(&mut app, now);
        assert!(app.is_waiting());
        assert!(!app.readout().preview.is_black());

        let result = run(&app, &ticket);
        assert!(app.complete_prediction(ticket.id, result, now));
        assert_eq!(app.readout().digit_text, "3");
        assert!(app.readout().high_confidence);
        assert!(app.visualizer().is_populated());
        assert!(!app.is_waiting());
    }

    #[test]
    fn near_empty_grid_issues_no_request() {
        let mut app = context(ScriptedBackend::online());
        let mut values = vec![0.0; 784];
        values[..5].iter_mut().for_each(|v| *v = 0.5);
        let grid = PixelGrid::from_values(values).unwrap();
        assert_eq!(grid.sum(), 2.5);
        assert!(app.submit_grid(grid, Instant::now()).is_none());
        assert!(!app.is_waiting());

        // A blank canvas never predicts either.
        assert!(app.request_prediction(Instant::now()).is_none());
    }

    #[test]
    fn superseded_response_is_discarded() {
        let mut app = context(ScriptedBackend::online());
        let now = Instant::now();
        let older = draw_bar(&mut app, now);
        let newer = app.request_prediction(now).unwrap();
        assert!(newer.id > older.id);

        let fresh = Prediction { digit: 7, confidence: 0.5, probabilities: [0.05; 10] };
        assert!(app.complete_prediction(newer.id, Ok(fresh), now));
        let late = reply_for(&older.grid).prediction;
        assert!(!app.complete_prediction(older.id, Ok(late), now));
        assert_eq!(app.readout().digit_text, "7");
    }

    #[test]
    fn moves_are_debounced_into_one_request() {
        let mut app = context(ScriptedBackend::online());
        let t0 = Instant::now();
        app.handle_input(&PointerEvent::MouseDown { client: Point2D::new(100.0, 60.0) }, &rect(), t0);
        for (i, y) in [100.0, 140.0, 180.0, 220.0].into_iter().enumerate() {
            let t = t0 + Duration::from_millis(40 * i as u64);
            let out = app.handle_input(&PointerEvent::MouseMove { client: Point2D::new(100.0, y) }, &rect(), t);
            assert!(out.ticket.is_none());
            assert!(app.tick(t).is_none());
        }
        // Last move at +120ms; the debounce fires 100ms later, once.
        assert!(app.tick(t0 + Duration::from_millis(200)).is_none());
        let ticket = app.tick(t0 + Duration::from_millis(220));
        assert!(ticket.is_some());
        assert!(app.tick(t0 + Duration::from_millis(400)).is_none());
    }

    #[test]
    fn rejection_is_shown_inline_without_touching_status() {
        let mut backend = ScriptedBackend::online();
        backend.reject_with = Some("model not loaded".into());
        let mut app = context(backend);
        app.startup();
        let now = Instant::now();
        let ticket = draw_bar(&mut app, now);
        let result = run(&app, &ticket);
        app.complete_prediction(ticket.id, result, now);
        assert_eq!(app.readout().confidence_text, "model not loaded");
        assert_eq!(app.status(), Status::Online);
        assert!(!app.visualizer().is_populated());
    }

    #[test]
    fn connectivity_failure_goes_offline_then_recovers() {
        let backend = ScriptedBackend::online();
        let online = backend.online.clone();
        let mut app = context(backend);
        app.startup();
        online.store(false, Ordering::SeqCst);

        let now = Instant::now();
        let ticket = draw_bar(&mut app, now);
        let result = run(&app, &ticket);
        app.complete_prediction(ticket.id, result, now);
        assert_eq!(app.status(), Status::Offline);
        assert_eq!(app.readout().confidence_text, readout::SERVER_OFFLINE);

        online.store(true, Ordering::SeqCst);
        let retry = app.request_prediction(now).unwrap();
        let result = run(&app, &retry);
        app.complete_prediction(retry.id, result, now);
        assert_eq!(app.status(), Status::Online);
        assert_eq!(app.readout().digit_text, "3");
    }

    #[test]
    fn predict_on_blank_canvas_retries_the_connection() {
        let backend = ScriptedBackend::online();
        let online = backend.online.clone();
        let handshakes = backend.handshakes.clone();
        online.store(false, Ordering::SeqCst);
        let mut app = context(backend);
        assert!(!app.startup());
        assert_eq!(handshakes.load(Ordering::SeqCst), 1);

        online.store(true, Ordering::SeqCst);
        let now = Instant::now();
        let outcome = app.manual_predict(now);
        assert!(outcome.ticket.is_none());
        assert!(outcome.retry_handshake);
        assert!(app.is_connecting());
        assert_eq!(app.status(), Status::Connecting);
        // Pressing again while the handshake runs queues nothing more.
        assert!(!app.manual_predict(now).retry_handshake);

        let ready = app.client().initialize();
        app.complete_handshake(ready);
        assert_eq!(handshakes.load(Ordering::SeqCst), 2);
        assert_eq!(app.status(), Status::Online);
        assert!(!app.is_connecting());
        assert_eq!(app.readout().digit_text, readout::DIGIT_PLACEHOLDER);
        assert_eq!(app.readout().confidence_text, readout::PROMPT);

        // Once ready, a blank canvas needs no handshake.
        assert!(!app.manual_predict(now).retry_handshake);
    }

    #[test]
    fn failed_retry_stays_offline() {
        let backend = ScriptedBackend::online();
        backend.online.store(false, Ordering::SeqCst);
        let mut app = context(backend);
        app.startup();

        assert!(app.manual_predict(Instant::now()).retry_handshake);
        let ready = app.client().initialize();
        app.complete_handshake(ready);
        assert_eq!(app.status(), Status::Offline);
        assert_eq!(app.readout().confidence_text, readout::SERVER_OFFLINE);
        assert!(app.manual_predict(Instant::now()).retry_handshake);
    }

    #[test]
    fn predict_with_a_drawing_sends_no_bare_handshake() {
        let backend = ScriptedBackend::online();
        let online = backend.online.clone();
        online.store(false, Ordering::SeqCst);
        let mut app = context(backend);
        app.startup();
        let now = Instant::now();
        draw_bar(&mut app, now);

        let outcome = app.manual_predict(now);
        assert!(outcome.ticket.is_some());
        assert!(!outcome.retry_handshake);
    }

    #[test]
    fn timeout_abandons_the_request() {
        let mut app = context(ScriptedBackend::online());
        let t0 = Instant::now();
        let ticket = draw_bar(&mut app, t0);
        assert_eq!(app.next_deadline(t0), Some(Duration::from_secs(5)));
        app.tick(t0 + Duration::from_secs(5));
        assert!(!app.is_waiting());
        assert_eq!(app.readout().confidence_text, "Inference timed out");

        let result = run(&app, &ticket);
        assert!(!app.complete_prediction(ticket.id, result, t0 + Duration::from_secs(6)));
        assert!(!app.visualizer().is_populated());
    }

    #[test]
    fn clear_resets_everything() {
        let mut app = context(ScriptedBackend::online());
        let now = Instant::now();
        let ticket = draw_bar(&mut app, now);
        let result = run(&app, &ticket);
        app.complete_prediction(ticket.id, result, now);

        let pending = app.request_prediction(now).unwrap();
        app.clear();
        assert!(app.stroke().canvas().image().pixels().all(|p| p.0[0] == 0));
        assert!(app.readout().preview.is_black());
        assert!(app.readout().rows.iter().all(|r| r.value_text == "0%" && !r.winner));
        assert!(!app.visualizer().is_populated());

        let late = run(&app, &pending);
        assert!(!app.complete_prediction(pending.id, late, now));
        assert!(!app.visualizer().is_populated());
    }

    #[test]
    fn brush_size_is_clamped() {
        let mut app = context(ScriptedBackend::online());
        assert_eq!(app.set_brush_size(2), 4);
        assert_eq!(app.set_brush_size(33), 33);
        assert_eq!(app.stroke().line_width(), 33.0);
    }
}
