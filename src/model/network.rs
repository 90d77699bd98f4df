use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::ModelError;
use super::activation::ActivationFunction;
use super::dense::Layer;
use super::matrix::Matrix;

/// Feed-forward stack of dense layers. Model files are the serde JSON of
/// this struct (`{"layers":[...]}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    /// Builds a He-initialized network from (size, input_size, activation) tuples.
    pub fn new<R: Rng>(layer_specs: Vec<(usize, usize, ActivationFunction)>, rng: &mut R) -> Network {
        let layers = layer_specs.into_iter()
            .map(|(size, input_size, activator)| Layer {
                size,
                weights: Matrix::he(input_size, size, rng),
                biases: Matrix::zeros(1, size),
                activator,
            })
            .collect();
        Network { layers }
    }

    /// Untrained 784 → 128 → 64 → 10 classifier.
    pub fn demo<R: Rng>(rng: &mut R) -> Network {
        Network::new(vec![
            (128, 784, ActivationFunction::ReLU),
            (64,  128, ActivationFunction::ReLU),
            (10,  64,  ActivationFunction::Softmax),
        ], rng)
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map(|l| l.input_size()).unwrap_or(0)
    }

    /// Verifies every layer is well formed and feeds the next.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::Shape("model has no layers".into()));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if !layer.is_well_formed() {
                return Err(ModelError::Shape(format!("layer {} weights/biases do not match size {}", i, layer.size)));
            }
            if let Some(next) = self.layers.get(i + 1) {
                if next.input_size() != layer.size {
                    return Err(ModelError::Shape(format!(
                        "layer {} expects {} inputs but layer {} produces {}",
                        i + 1, next.input_size(), i, layer.size
                    )));
                }
            }
        }
        Ok(())
    }

    /// Forward pass returning every layer's output, input layer excluded.
    pub fn forward_trace(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut outputs: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let next = layer.forward(outputs.last().map(|v| v.as_slice()).unwrap_or(input));
            outputs.push(next);
        }
        outputs
    }

    /// Serializes the network to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<(), ModelError> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Loads and validates a network previously written by `save_json`.
    pub fn load_json(path: &str) -> Result<Network, ModelError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let network: Network = serde_json::from_reader(reader)?;
        network.validate()?;
        Ok(network)
    }
}
