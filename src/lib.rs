pub mod app;
pub mod canvas;
pub mod config;
pub mod downsample;
pub mod error;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod readout;
pub mod timing;
pub mod visualizer;

// Convenience re-exports
pub use app::{AppContext, InputOutcome, PredictOutcome};
pub use canvas::{CanvasRect, DrawingCanvas, Point2D, PointerEvent, StrokeCapture};
pub use config::{BackendChoice, Config};
pub use downsample::{Downsampler, PixelGrid, PixelPreview};
pub use error::{ConfigError, InferenceError, ModelError};
pub use inference::{
    HttpBackend, InferenceBackend, InferenceClient, LocalBackend, NetworkArchitecture, NetworkState, Prediction,
};
pub use pipeline::{InferenceWorker, PredictionTicket};
pub use readout::{ReadoutPanel, Status, StatusIndicator};
pub use timing::{DebounceTimer, RequestId, RequestSequencer};
pub use visualizer::{NetworkVisualizer, Viewport};
