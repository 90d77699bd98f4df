use thiserror::Error;

/// Failure of a single exchange with the inference service.
///
/// The variants fall into two classes: connectivity failures (the service
/// could not be reached at all) and inference failures (the service answered
/// but the answer is unusable).  Only the former affects the status LED.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// Readiness handshake failed or the transport could not reach the service.
    #[error("Server offline: {0}")]
    Offline(String),

    /// The service reported a failure for this request.
    #[error("{0}")]
    Rejected(String),

    /// The reply did not match the expected shape.
    #[error("Malformed reply: {0}")]
    Malformed(String),

    /// No reply arrived within the configured timeout.
    #[error("Inference timed out")]
    TimedOut,
}

impl InferenceError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, InferenceError::Offline(_))
    }
}

/// Errors raised while loading a dense model for the local backend.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model shape error: {0}")]
    Shape(String),
}

/// Invalid environment configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}
