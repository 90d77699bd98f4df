use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::downsample::{PixelGrid, GRID_LEN};
use crate::error::{InferenceError, ModelError};
use crate::model::Network;

use super::client::InferenceBackend;
use super::{ActivationSnapshot, LayerId, NetworkArchitecture, NetworkState, Prediction, PredictionReply, CLASS_COUNT};

/// In-process backend running a three-layer dense network.
pub struct LocalBackend {
    network: Network,
    architecture: NetworkArchitecture,
    label: String,
}

impl LocalBackend {
    /// Wraps a network shaped 784 → h1 → h2 → 10.
    pub fn new(network: Network, label: impl Into<String>) -> Result<Self, ModelError> {
        network.validate()?;
        if network.layers.len() != 3 {
            return Err(ModelError::Shape(format!("expected 3 dense layers, got {}", network.layers.len())));
        }
        if network.input_size() != GRID_LEN {
            return Err(ModelError::Shape(format!("expected {} inputs, got {}", GRID_LEN, network.input_size())));
        }
        let output = network.layers[2].size;
        if output != CLASS_COUNT {
            return Err(ModelError::Shape(format!("expected {} outputs, got {}", CLASS_COUNT, output)));
        }
        let architecture = NetworkArchitecture::from_sizes([
            GRID_LEN,
            network.layers[0].size,
            network.layers[1].size,
            output,
        ]);
        Ok(LocalBackend { network, architecture, label: label.into() })
    }

    pub fn from_file(path: &str) -> Result<Self, ModelError> {
        Self::new(Network::load_json(path)?, path)
    }

    /// Untrained demo network with deterministic weights.
    pub fn demo(seed: u64) -> Self {
        let network = Network::demo(&mut StdRng::seed_from_u64(seed));
        LocalBackend {
            architecture: NetworkArchitecture::fixed(),
            network,
            label: "untrained demo network".into(),
        }
    }

    pub fn architecture(&self) -> &NetworkArchitecture {
        &self.architecture
    }
}

impl InferenceBackend for LocalBackend {
    fn handshake(&self) -> Result<(), InferenceError> {
        Ok(())
    }

    fn predict(&self, grid: &PixelGrid) -> Result<PredictionReply, InferenceError> {
        let mut trace = self.network.forward_trace(grid.values()).into_iter();
        let (Some(hidden1), Some(hidden2), Some(output)) = (trace.next(), trace.next(), trace.next()) else {
            return Err(InferenceError::Rejected("network produced no output".into()));
        };

        let (digit, confidence) = output
            .iter()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        let prediction = Prediction::new(digit as i64, confidence, &output)?;

        let activations = ActivationSnapshot::new()
            .with_layer(LayerId::Input, grid.values().to_vec())
            .with_layer(LayerId::Hidden1, hidden1)
            .with_layer(LayerId::Hidden2, hidden2)
            .with_layer(LayerId::Output, output);

        Ok(PredictionReply {
            prediction,
            state: NetworkState { architecture: self.architecture.clone(), activations },
        })
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActivationFunction;

    #[test]
    fn demo_backend_reports_every_layer() {
        let backend = LocalBackend::demo(11);
        backend.handshake().unwrap();
        let mut values = vec![0.0; GRID_LEN];
        values[300..400].iter_mut().for_each(|v| *v = 1.0);
        let reply = backend.predict(&PixelGrid::from_values(values).unwrap()).unwrap();

        let acts = &reply.state.activations;
        assert_eq!(acts.get(LayerId::Input).map(|v| v.len()), Some(784));
        assert_eq!(acts.get(LayerId::Hidden1).map(|v| v.len()), Some(128));
        assert_eq!(acts.get(LayerId::Hidden2).map(|v| v.len()), Some(64));
        assert_eq!(acts.get(LayerId::Output).map(|v| v.len()), Some(10));

        let p = &reply.prediction;
        assert_eq!(p.confidence, p.probabilities[p.digit as usize]);
        assert!(p.probabilities.iter().all(|&q| q <= p.confidence));
        assert!((p.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_prediction() {
        let grid = PixelGrid::from_values(vec![0.2; GRID_LEN]).unwrap();
        let a = LocalBackend::demo(5).predict(&grid).unwrap();
        let b = LocalBackend::demo(5).predict(&grid).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_networks_of_the_wrong_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let two_layers = Network::new(vec![
            (32, 784, ActivationFunction::ReLU),
            (10, 32, ActivationFunction::Softmax),
        ], &mut rng);
        assert!(LocalBackend::new(two_layers, "x").is_err());

        let wrong_input = Network::new(vec![
            (32, 100, ActivationFunction::ReLU),
            (16, 32, ActivationFunction::ReLU),
            (10, 16, ActivationFunction::Softmax),
        ], &mut rng);
        assert!(LocalBackend::new(wrong_input, "x").is_err());

        let ok = Network::new(vec![
            (32, 784, ActivationFunction::ReLU),
            (16, 32, ActivationFunction::ReLU),
            (10, 16, ActivationFunction::Softmax),
        ], &mut rng);
        let backend = LocalBackend::new(ok, "small").unwrap();
        let sizes: Vec<usize> = backend.architecture().layers.iter().map(|l| l.display_size).collect();
        assert_eq!(sizes, vec![16, 16, 14, 10]);
    }

    #[test]
    fn missing_model_file_is_an_io_error() {
        assert!(matches!(LocalBackend::from_file("/nonexistent/model.json"), Err(ModelError::Io(_))));
    }
}
