/// Prediction readout: the large digit display, confidence line, the ten
/// probability rows and the 28×28 pixel preview, plus the connectivity LED.

use std::time::{Duration, Instant};

use crate::downsample::PixelPreview;
use crate::inference::{Prediction, CLASS_COUNT};

pub const DIGIT_PLACEHOLDER: &str = "?";
pub const DIGIT_OFFLINE: &str = "!";
pub const PROMPT: &str = "Draw a digit";
pub const OFFLINE_HINT: &str = "Start the inference service";
pub const SERVER_OFFLINE: &str = "Server offline";
/// Confidence strictly above this enters the high-confidence state.
pub const HIGH_CONFIDENCE: f64 = 0.8;
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow {
    pub label: u8,
    /// Bar width as a percentage of the track.
    pub width_pct: f64,
    pub value_text: String,
    pub winner: bool,
}

impl ProbabilityRow {
    fn zero(label: u8) -> Self {
        ProbabilityRow { label, width_pct: 0.0, value_text: "0%".to_owned(), winner: false }
    }
}

pub struct ReadoutPanel {
    pub digit_text: String,
    pub confidence_text: String,
    pub high_confidence: bool,
    pub rows: Vec<ProbabilityRow>,
    pub preview: PixelPreview,
    highlight_until: Option<Instant>,
}

impl ReadoutPanel {
    pub fn new() -> Self {
        ReadoutPanel {
            digit_text: DIGIT_PLACEHOLDER.to_owned(),
            confidence_text: PROMPT.to_owned(),
            high_confidence: false,
            rows: (0..CLASS_COUNT as u8).map(ProbabilityRow::zero).collect(),
            preview: PixelPreview::black(),
            highlight_until: None,
        }
    }

    pub fn show(&mut self, prediction: &Prediction, now: Instant) {
        self.digit_text = prediction.digit.to_string();
        self.highlight_until = Some(now + HIGHLIGHT_DURATION);

        self.confidence_text = format!("{:.1} %", prediction.confidence * 100.0);
        self.high_confidence = prediction.confidence > HIGH_CONFIDENCE;

        for (row, &p) in self.rows.iter_mut().zip(prediction.probabilities.iter()) {
            let pct = p * 100.0;
            row.width_pct = (pct * 10.0).round() / 10.0;
            row.value_text = format!("{:.1}%", pct);
            row.winner = row.label == prediction.digit;
        }
    }

    /// Shows a failure inline; the rest of the readout keeps its last state.
    pub fn show_error(&mut self, message: &str) {
        self.confidence_text = message.to_owned();
        self.high_confidence = false;
    }

    /// Replaces digit and confidence text, e.g. for startup messaging.
    pub fn show_message(&mut self, digit: &str, message: &str) {
        self.digit_text = digit.to_owned();
        self.confidence_text = message.to_owned();
        self.high_confidence = false;
    }

    pub fn set_preview(&mut self, preview: PixelPreview) {
        self.preview = preview;
    }

    pub fn clear(&mut self) {
        self.digit_text = DIGIT_PLACEHOLDER.to_owned();
        self.confidence_text = PROMPT.to_owned();
        self.high_confidence = false;
        for row in &mut self.rows {
            *row = ProbabilityRow::zero(row.label);
        }
        self.preview = PixelPreview::black();
        self.highlight_until = None;
    }

    /// Whether the transient highlight on the digit display is active.
    pub fn is_highlighted(&self, now: Instant) -> bool {
        self.highlight_until.map_or(false, |until| now < until)
    }

    pub fn winner(&self) -> Option<u8> {
        self.rows.iter().find(|r| r.winner).map(|r| r.label)
    }
}

impl Default for ReadoutPanel {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Connecting,
    Online,
    Offline,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Connecting => "CONNECTING",
            Status::Online => "ONLINE",
            Status::Offline => "OFFLINE",
        }
    }

    /// CSS class of the LED.
    pub fn led_class(self) -> &'static str {
        match self {
            Status::Connecting => "",
            Status::Online => "on",
            Status::Offline => "err",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusIndicator {
    status: Status,
}

impl StatusIndicator {
    pub fn new() -> Self {
        StatusIndicator { status: Status::Connecting }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns `true` when the status actually changed.
    pub fn set(&mut self, status: Status) -> bool {
        let changed = self.status != status;
        self.status = status;
        changed
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::new()
    }
}
