/// Event-loop timing primitives: a cancelable debounce timer and the
/// request sequencer that keeps superseded predictions off the display.
///
/// Neither type reads the clock; callers pass `now` so the event loop (and
/// tests) decide what time it is.

use std::time::{Duration, Instant};

/// Delay-and-cancel timer. At most one deadline is pending at a time; arming
/// again restarts it.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DebounceTimer {
    pub fn new(delay: Duration) -> Self {
        DebounceTimer { delay, deadline: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)starts the timer from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the pending deadline, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// Returns `true` exactly once when the deadline has passed, disarming the timer.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Identity of one issued prediction request. Ids increase monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Tracks which prediction request is allowed to update the display.
///
/// Only the most recently issued request is current. Retiring it (on clear
/// or timeout) leaves no request current until the next `issue`.
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    last_issued: u64,
    current: Option<RequestId>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestId {
        self.last_issued += 1;
        let id = RequestId(self.last_issued);
        self.current = Some(id);
        id
    }

    /// Whether a response to `id` may be applied.
    pub fn accepts(&self, id: RequestId) -> bool {
        self.current == Some(id)
    }

    /// Marks the current request as settled or abandoned.
    pub fn retire(&mut self) -> Option<RequestId> {
        self.current.take()
    }

    pub fn current(&self) -> Option<RequestId> {
        self.current
    }
}
