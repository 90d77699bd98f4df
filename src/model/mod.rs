//! Dense feed-forward network used by the in-process inference backend.

pub mod activation;
pub mod dense;
pub mod matrix;
pub mod network;

pub use activation::ActivationFunction;
pub use dense::Layer;
pub use matrix::Matrix;
pub use network::Network;
