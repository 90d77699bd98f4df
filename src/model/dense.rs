use serde::{Serialize, Deserialize};

use super::activation::{softmax, ActivationFunction};
use super::matrix::Matrix;

/// Fully connected layer: `a = f(x·W + b)`.
///
/// `weights` is shaped (input_size, size) and `biases` is a 1×size row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
}

impl Layer {
    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Checks that weights and biases agree with `size`.
    pub fn is_well_formed(&self) -> bool {
        self.weights.is_consistent()
            && self.biases.is_consistent()
            && self.weights.cols == self.size
            && self.biases.rows == 1
            && self.biases.cols == self.size
    }

    /// Forward pass for one input row. Callers guarantee
    /// `input.len() == self.input_size()`.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let z = &(&Matrix::row(input.to_vec()) * &self.weights) + &self.biases;
        let row = z.data.into_iter().next().unwrap_or_default();
        match self.activator {
            ActivationFunction::Softmax => softmax(&row),
            ref f => row.into_iter().map(|x| f.function(x)).collect(),
        }
    }
}
