//! Boundary to the digit classifier: result types, the readiness-tracking
//! client, and the HTTP and in-process backends behind it.

pub mod client;
pub mod http;
pub mod local;

pub use client::{InferenceBackend, InferenceClient};
pub use http::HttpBackend;
pub use local::LocalBackend;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

pub const CLASS_COUNT: usize = 10;

/// The four layers the visualizer knows how to draw, input first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerId {
    Input,
    Hidden1,
    Hidden2,
    Output,
}

impl LayerId {
    pub const ALL: [LayerId; 4] = [LayerId::Input, LayerId::Hidden1, LayerId::Hidden2, LayerId::Output];

    pub fn key(self) -> &'static str {
        match self {
            LayerId::Input => "input",
            LayerId::Hidden1 => "hidden1",
            LayerId::Hidden2 => "hidden2",
            LayerId::Output => "output",
        }
    }

    pub fn from_key(key: &str) -> Option<LayerId> {
        LayerId::ALL.into_iter().find(|id| id.key() == key)
    }
}

/// One column of the network diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub name: String,
    /// True neuron count.
    pub size: usize,
    /// Number of nodes actually drawn; never exceeds `size`.
    pub display_size: usize,
}

impl LayerDescriptor {
    pub fn new(name: impl Into<String>, size: usize, display_cap: usize) -> Self {
        LayerDescriptor { name: name.into(), size, display_size: display_cap.min(size) }
    }
}

/// Ordered layer descriptors, input layer first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkArchitecture {
    pub layers: Vec<LayerDescriptor>,
}

/// Display caps applied per layer position.
pub const DISPLAY_CAPS: [usize; 4] = [16, 16, 14, 10];
const LAYER_NAMES: [&str; 4] = ["INPUT", "HIDDEN-1", "HIDDEN-2", "OUTPUT"];

impl NetworkArchitecture {
    /// Builds the four-column architecture for the given true layer sizes.
    pub fn from_sizes(sizes: [usize; 4]) -> Self {
        NetworkArchitecture {
            layers: sizes
                .iter()
                .zip(LAYER_NAMES.iter().zip(DISPLAY_CAPS.iter()))
                .map(|(&size, (&name, &cap))| LayerDescriptor::new(name, size, cap))
                .collect(),
        }
    }

    /// The 784 / 128 / 64 / 10 classifier.
    pub fn fixed() -> Self {
        Self::from_sizes([784, 128, 64, 10])
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerDescriptor> {
        self.layers.get(id as usize)
    }
}

impl Default for NetworkArchitecture {
    fn default() -> Self {
        Self::fixed()
    }
}

/// Per-layer activation magnitudes from one prediction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationSnapshot {
    layers: BTreeMap<LayerId, Vec<f64>>,
}

impl ActivationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, id: LayerId, values: Vec<f64>) -> Self {
        self.layers.insert(id, values);
        self
    }

    pub fn get(&self, id: LayerId) -> Option<&[f64]> {
        self.layers.get(&id).map(|v| v.as_slice())
    }

    /// Activation of one neuron; absent layers and indices read as zero.
    pub fn value(&self, id: LayerId, neuron: usize) -> f64 {
        self.get(id).and_then(|v| v.get(neuron)).copied().unwrap_or(0.0)
    }
}

/// Classification of one pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub digit: u8,
    pub confidence: f64,
    pub probabilities: [f64; CLASS_COUNT],
}

impl Prediction {
    /// Validates raw service output.
    pub fn new(digit: i64, confidence: f64, probabilities: &[f64]) -> Result<Self, InferenceError> {
        if !(0..CLASS_COUNT as i64).contains(&digit) {
            return Err(InferenceError::Malformed(format!("digit {} is not a class index", digit)));
        }
        if !confidence.is_finite() {
            return Err(InferenceError::Malformed("confidence is not a number".into()));
        }
        let probabilities: [f64; CLASS_COUNT] = probabilities.try_into().map_err(|_| {
            InferenceError::Malformed(format!("expected {} probabilities, got {}", CLASS_COUNT, probabilities.len()))
        })?;
        Ok(Prediction { digit: digit as u8, confidence: confidence.clamp(0.0, 1.0), probabilities })
    }
}

/// The network state the visualizer draws: the architecture plus the
/// activations of the latest successful prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkState {
    pub architecture: NetworkArchitecture,
    pub activations: ActivationSnapshot,
}

/// Everything a backend returns for one successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionReply {
    pub prediction: Prediction,
    pub state: NetworkState,
}
