use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::downsample::PixelGrid;
use crate::error::InferenceError;
use crate::timing::RequestId;

use super::{NetworkState, Prediction, PredictionReply};

/// A source of predictions: an external service or an in-process network.
pub trait InferenceBackend: Send + Sync {
    /// Checks that the backend can serve predictions.
    fn handshake(&self) -> Result<(), InferenceError>;

    fn predict(&self, grid: &PixelGrid) -> Result<PredictionReply, InferenceError>;

    /// Short description for logs and the startup banner.
    fn describe(&self) -> String;
}

struct ClientInner {
    backend: Box<dyn InferenceBackend>,
    ready: AtomicBool,
    latest: Mutex<Option<(RequestId, NetworkState)>>,
}

/// Readiness-tracking front of an `InferenceBackend`.
///
/// Clones share one readiness flag and one retained network state, so a
/// clone handed to a worker thread updates what the event loop sees.
#[derive(Clone)]
pub struct InferenceClient {
    inner: Arc<ClientInner>,
}

impl InferenceClient {
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        InferenceClient {
            inner: Arc::new(ClientInner {
                backend,
                ready: AtomicBool::new(false),
                latest: Mutex::new(None),
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Performs the readiness handshake. Safe to call repeatedly.
    pub fn initialize(&self) -> bool {
        match self.inner.backend.handshake() {
            Ok(()) => {
                if !self.inner.ready.swap(true, Ordering::SeqCst) {
                    info!(backend = %self.inner.backend.describe(), "inference backend online");
                }
                true
            }
            Err(e) => {
                self.inner.ready.store(false, Ordering::SeqCst);
                warn!(backend = %self.inner.backend.describe(), error = %e, "inference backend unreachable");
                false
            }
        }
    }

    /// Classifies `grid`, re-running the handshake first if the client is
    /// not ready. On success the network state is retained for `request`
    /// unless a later request already stored its own.
    pub fn predict(&self, request: RequestId, grid: &PixelGrid) -> Result<Prediction, InferenceError> {
        if !self.is_ready() && !self.initialize() {
            return Err(InferenceError::Offline(format!("{} is unreachable", self.inner.backend.describe())));
        }

        match self.inner.backend.predict(grid) {
            Ok(reply) => {
                let mut latest = self.inner.latest.lock().unwrap_or_else(PoisonError::into_inner);
                let newer_stored = matches!(&*latest, Some((stored, _)) if *stored > request);
                if newer_stored {
                    debug!(request = request.0, "not retaining activations of an older request");
                } else {
                    *latest = Some((request, reply.state));
                }
                Ok(reply.prediction)
            }
            Err(e) => {
                if e.is_connectivity() {
                    self.inner.ready.store(false, Ordering::SeqCst);
                }
                warn!(request = request.0, error = %e, "prediction failed");
                Err(e)
            }
        }
    }

    /// Architecture and activations from the most recent successful prediction.
    pub fn network_state(&self) -> Option<NetworkState> {
        let latest = self.inner.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.as_ref().map(|(_, state)| state.clone())
    }

    pub fn describe(&self) -> String {
        self.inner.backend.describe()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::inference::{ActivationSnapshot, LayerId, NetworkArchitecture};
    use std::sync::atomic::AtomicUsize;

    /// Backend whose availability and replies are scripted by the test.
    pub(crate) struct ScriptedBackend {
        pub online: Arc<AtomicBool>,
        pub handshakes: Arc<AtomicUsize>,
        pub reject_with: Option<String>,
    }

    impl ScriptedBackend {
        pub(crate) fn online() -> Self {
            ScriptedBackend {
                online: Arc::new(AtomicBool::new(true)),
                handshakes: Arc::new(AtomicUsize::new(0)),
                reject_with: None,
            }
        }
    }

    pub(crate) fn reply_for(grid: &PixelGrid) -> PredictionReply {
        let mut probabilities = [0.01; 10];
        probabilities[3] = 0.91;
        PredictionReply {
            prediction: Prediction { digit: 3, confidence: 0.91, probabilities },
            state: NetworkState {
                architecture: NetworkArchitecture::fixed(),
                activations: ActivationSnapshot::new()
                    .with_layer(LayerId::Input, grid.values().to_vec())
                    .with_layer(LayerId::Hidden1, vec![0.7; 128])
                    .with_layer(LayerId::Hidden2, vec![0.3; 64])
                    .with_layer(LayerId::Output, probabilities.to_vec()),
            },
        }
    }

    impl InferenceBackend for ScriptedBackend {
        fn handshake(&self) -> Result<(), InferenceError> {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            if self.online.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(InferenceError::Offline("connection refused".into()))
            }
        }

        fn predict(&self, grid: &PixelGrid) -> Result<PredictionReply, InferenceError> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(InferenceError::Offline("connection reset".into()));
            }
            match &self.reject_with {
                Some(msg) => Err(InferenceError::Rejected(msg.clone())),
                None => Ok(reply_for(grid)),
            }
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let backend = ScriptedBackend::online();
        let handshakes = backend.handshakes.clone();
        let client = InferenceClient::new(Box::new(backend));
        assert!(!client.is_ready());
        assert!(client.initialize());
        assert!(client.initialize());
        assert!(client.is_ready());
        assert_eq!(handshakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn predict_initializes_when_not_ready() {
        let backend = ScriptedBackend::online();
        let handshakes = backend.handshakes.clone();
        let client = InferenceClient::new(Box::new(backend));
        let p = client.predict(RequestId(1), &PixelGrid::blank()).unwrap();
        assert_eq!(p.digit, 3);
        assert_eq!(handshakes.load(Ordering::SeqCst), 1);
        assert!(client.is_ready());
        // Ready clients skip the handshake.
        client.predict(RequestId(2), &PixelGrid::blank()).unwrap();
        assert_eq!(handshakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn offline_backend_yields_connectivity_error() {
        let backend = ScriptedBackend::online();
        backend.online.store(false, Ordering::SeqCst);
        let client = InferenceClient::new(Box::new(backend));
        let err = client.predict(RequestId(1), &PixelGrid::blank()).unwrap_err();
        assert!(err.is_connectivity());
        assert!(client.network_state().is_none());
    }

    #[test]
    fn transport_failure_clears_readiness_and_recovers() {
        let backend = ScriptedBackend::online();
        let online = backend.online.clone();
        let client = InferenceClient::new(Box::new(backend));
        assert!(client.initialize());
        online.store(false, Ordering::SeqCst);
        assert!(client.predict(RequestId(1), &PixelGrid::blank()).is_err());
        assert!(!client.is_ready());
        online.store(true, Ordering::SeqCst);
        assert!(client.predict(RequestId(2), &PixelGrid::blank()).is_ok());
        assert!(client.is_ready());
    }

    #[test]
    fn rejection_keeps_readiness() {
        let mut backend = ScriptedBackend::online();
        backend.reject_with = Some("model not loaded".into());
        let client = InferenceClient::new(Box::new(backend));
        let err = client.predict(RequestId(1), &PixelGrid::blank()).unwrap_err();
        assert_eq!(err, InferenceError::Rejected("model not loaded".into()));
        assert!(client.is_ready());
    }

    #[test]
    fn retains_state_of_newest_request_only() {
        let client = InferenceClient::new(Box::new(ScriptedBackend::online()));
        let mut newer = vec![0.0; 784];
        newer[0] = 1.0;
        let newer = PixelGrid::from_values(newer).unwrap();
        client.predict(RequestId(5), &newer).unwrap();
        client.predict(RequestId(4), &PixelGrid::blank()).unwrap();
        let state = client.network_state().unwrap();
        assert_eq!(state.activations.value(LayerId::Input, 0), 1.0);
        // Clones share the retained state.
        assert!(client.clone().network_state().is_some());
    }
}
