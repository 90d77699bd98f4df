use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::debug;

use crate::downsample::PixelGrid;
use crate::error::InferenceError;
use crate::inference::{InferenceClient, Prediction};
use crate::timing::RequestId;

/// A prediction the event loop wants run: the request's id and its grid.
#[derive(Debug, Clone)]
pub struct PredictionTicket {
    pub id: RequestId,
    pub grid: PixelGrid,
}

pub type Completion = (RequestId, Result<Prediction, InferenceError>);

/// Runs predictions off the event loop, one thread per request.
///
/// Results come back over a channel in completion order, which need not
/// match submission order. The event loop drains them and lets the request
/// sequencer decide which one still matters. Readiness handshakes run the
/// same way and report on a channel of their own.
pub struct InferenceWorker {
    client: InferenceClient,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    handshake_tx: Sender<bool>,
    handshake_rx: Receiver<bool>,
}

impl InferenceWorker {
    pub fn new(client: InferenceClient) -> Self {
        let (tx, rx) = mpsc::channel();
        let (handshake_tx, handshake_rx) = mpsc::channel();
        InferenceWorker { client, tx, rx, handshake_tx, handshake_rx }
    }

    pub fn submit(&self, ticket: PredictionTicket) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = client.predict(ticket.id, &ticket.grid);
            if tx.send((ticket.id, result)).is_err() {
                debug!(request = ticket.id.0, "event loop gone; dropping prediction");
            }
        });
    }

    /// Re-runs the readiness handshake; the outcome arrives via `drain_handshakes`.
    pub fn submit_handshake(&self) {
        let client = self.client.clone();
        let tx = self.handshake_tx.clone();
        thread::spawn(move || {
            let online = client.initialize();
            if tx.send(online).is_err() {
                debug!(online, "event loop gone; dropping handshake result");
            }
        });
    }

    pub fn drain_handshakes(&self) -> Vec<bool> {
        self.handshake_rx.try_iter().collect()
    }

    /// Every completion received so far, without blocking.
    pub fn drain(&self) -> Vec<Completion> {
        self.rx.try_iter().collect()
    }

    /// Blocks until one completion arrives or `timeout` passes.
    pub fn wait(&self, timeout: std::time::Duration) -> Option<Completion> {
        self.rx.recv_timeout(timeout).ok()
    }
}
