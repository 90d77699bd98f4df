use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::downsample::PixelGrid;
use crate::error::InferenceError;

use super::client::InferenceBackend;
use super::{ActivationSnapshot, LayerDescriptor, LayerId, NetworkArchitecture, NetworkState, Prediction, PredictionReply};

const PATH_HEALTH: &str = "/health";
const PATH_PREDICT: &str = "/predict";

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    pixels: &'a [f64],
}

#[derive(Debug, Deserialize)]
struct WireLayer {
    name: String,
    size: usize,
    #[serde(default)]
    display_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct WireArchitecture {
    layers: Vec<WireLayer>,
}

#[derive(Debug, Deserialize)]
struct PredictBody {
    digit: i64,
    confidence: f64,
    probabilities: Vec<f64>,
    #[serde(default)]
    activations: HashMap<String, Vec<f64>>,
    #[serde(default)]
    architecture: Option<WireArchitecture>,
}

/// Reply of `POST /predict`: either an `{"error": ...}` object or a prediction.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictResponse {
    Failure { error: String },
    Success(PredictBody),
}

impl PredictBody {
    fn into_reply(self) -> Result<PredictionReply, InferenceError> {
        let prediction = Prediction::new(self.digit, self.confidence, &self.probabilities)?;

        let architecture = match self.architecture {
            None => NetworkArchitecture::fixed(),
            Some(wire) => {
                if wire.layers.len() != LayerId::ALL.len() {
                    return Err(InferenceError::Malformed(format!(
                        "expected {} layers in architecture, got {}",
                        LayerId::ALL.len(),
                        wire.layers.len()
                    )));
                }
                NetworkArchitecture {
                    layers: wire
                        .layers
                        .into_iter()
                        .zip(super::DISPLAY_CAPS)
                        .map(|(l, cap)| LayerDescriptor::new(l.name, l.size, l.display_size.unwrap_or(cap)))
                        .collect(),
                }
            }
        };

        let mut activations = ActivationSnapshot::new();
        for (key, values) in self.activations {
            match LayerId::from_key(&key) {
                Some(id) => activations = activations.with_layer(id, values),
                None => debug!(layer = %key, "ignoring activations for unknown layer"),
            }
        }

        Ok(PredictionReply { prediction, state: NetworkState { architecture, activations } })
    }
}

/// Backend talking to an external inference service over HTTP/JSON.
pub struct HttpBackend {
    client: HttpClient,
    base_url: String,
}

impl HttpBackend {
    /// `timeout` bounds every request, handshake included.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Offline(format!("failed to build HTTP client: {}", e)))?;
        Ok(HttpBackend { client, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(e: reqwest::Error) -> InferenceError {
    if e.is_timeout() {
        InferenceError::TimedOut
    } else {
        InferenceError::Offline(e.to_string())
    }
}

impl InferenceBackend for HttpBackend {
    fn handshake(&self) -> Result<(), InferenceError> {
        let resp = self.client.get(self.url_for(PATH_HEALTH)).send().map_err(transport_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(InferenceError::Offline(format!("health check returned {}", resp.status())))
        }
    }

    fn predict(&self, grid: &PixelGrid) -> Result<PredictionReply, InferenceError> {
        let resp = self
            .client
            .post(self.url_for(PATH_PREDICT))
            .json(&PredictRequest { pixels: grid.values() })
            .send()
            .map_err(transport_error)?;

        let status = resp.status();
        let text = resp.text().map_err(transport_error)?;
        let parsed = serde_json::from_str::<PredictResponse>(&text);

        if !status.is_success() {
            return Err(match parsed {
                Ok(PredictResponse::Failure { error }) => InferenceError::Rejected(error),
                _ => InferenceError::Rejected(format!("service returned {}", status)),
            });
        }

        match parsed {
            Ok(PredictResponse::Failure { error }) => Err(InferenceError::Rejected(error)),
            Ok(PredictResponse::Success(body)) => body.into_reply(),
            Err(e) => Err(InferenceError::Malformed(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<PredictionReply, InferenceError> {
        match serde_json::from_str::<PredictResponse>(json).unwrap() {
            PredictResponse::Failure { error } => Err(InferenceError::Rejected(error)),
            PredictResponse::Success(body) => body.into_reply(),
        }
    }

    #[test]
    fn error_object_is_a_rejection() {
        assert_eq!(parse(r#"{"error":"bad input"}"#), Err(InferenceError::Rejected("bad input".into())));
    }

    #[test]
    fn reply_without_architecture_uses_fixed_one() {
        let reply = parse(
            r#"{"digit":7,"confidence":0.85,
                "probabilities":[0,0,0,0,0,0,0,0.85,0.1,0.05],
                "activations":{"output":[0,0,0,0,0,0,0,0.85,0.1,0.05],"hidden1":[0.5],"extra":[1]}}"#,
        )
        .unwrap();
        assert_eq!(reply.prediction.digit, 7);
        assert_eq!(reply.state.architecture, NetworkArchitecture::fixed());
        assert_eq!(reply.state.activations.value(LayerId::Output, 7), 0.85);
        assert_eq!(reply.state.activations.value(LayerId::Hidden1, 0), 0.5);
        assert!(reply.state.activations.get(LayerId::Input).is_none());
    }

    #[test]
    fn declared_architecture_is_capped() {
        let reply = parse(
            r#"{"digit":1,"confidence":0.5,"probabilities":[0.1,0.5,0.1,0.1,0.1,0.1,0,0,0,0],
                "architecture":{"layers":[
                    {"name":"in","size":784},{"name":"h1","size":8},
                    {"name":"h2","size":64,"display_size":40},{"name":"out","size":10}]}}"#,
        )
        .unwrap();
        let arch = reply.state.architecture;
        assert_eq!(arch.layers[0].display_size, 16);
        assert_eq!(arch.layers[1].display_size, 8);
        assert_eq!(arch.layers[2].display_size, 40);
        assert_eq!(arch.layers[3].name, "out");
    }

    #[test]
    fn wrong_layer_count_is_malformed() {
        let err = parse(
            r#"{"digit":1,"confidence":0.5,"probabilities":[0,1,0,0,0,0,0,0,0,0],
                "architecture":{"layers":[{"name":"in","size":784}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InferenceError::Malformed(_)));
    }

    #[test]
    fn request_serializes_pixels() {
        let grid = PixelGrid::blank();
        let json = serde_json::to_string(&PredictRequest { pixels: grid.values() }).unwrap();
        assert!(json.starts_with(r#"{"pixels":[0.0,"#));
    }
}
