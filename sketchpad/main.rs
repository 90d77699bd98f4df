/// digit-scope sketchpad
///
/// Draw a digit in the browser and watch the classifier's prediction and
/// layer activations update live. Served by a synchronous tiny_http server;
/// the page is a single template with a thin event-forwarding script.
///
/// Run with:
///   cargo run --bin sketchpad --release
/// Then open http://127.0.0.1:7878
///
/// Backends (see `Config::from_env`):
///   SKETCHPAD_INFERENCE_URL=http://host:port   external inference service
///   SKETCHPAD_MODEL=path/to/model.json         in-process dense network
///   SKETCHPAD_MODEL=demo                       untrained demo network

mod handlers;
mod render;
mod routes;
mod state;
mod util;

use std::time::Instant;

use digit_scope::config::print_banner;
use digit_scope::{
    AppContext, BackendChoice, Config, HttpBackend, InferenceBackend, InferenceClient, InferenceWorker,
    LocalBackend, Viewport,
};
use tiny_http::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use state::SketchpadState;

const DEMO_SEED: u64 = 7;

fn build_backend(config: &Config) -> Result<Box<dyn InferenceBackend>, String> {
    match &config.backend {
        BackendChoice::Http { base_url } => HttpBackend::new(base_url, config.request_timeout)
            .map(|b| Box::new(b) as Box<dyn InferenceBackend>)
            .map_err(|e| e.to_string()),
        BackendChoice::LocalModel { path } => LocalBackend::from_file(path)
            .map(|b| Box::new(b) as Box<dyn InferenceBackend>)
            .map_err(|e| format!("{}: {}", path, e)),
        BackendChoice::LocalDemo => Ok(Box::new(LocalBackend::demo(DEMO_SEED))),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let backend = match build_backend(&config) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "could not set up the inference backend");
            std::process::exit(1);
        }
    };
    let server = match Server::http(config.bind_addr.as_str()) {
        Ok(s) => s,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "failed to bind HTTP server");
            std::process::exit(1);
        }
    };

    print_banner(&config);

    let client = InferenceClient::new(backend);
    let worker = InferenceWorker::new(client.clone());
    let mut app = AppContext::new(&config, client, Viewport::new(640.0, 420.0, 1.0));
    let online = app.startup();
    info!(online, backend = %app.client().describe(), "sketchpad ready");

    let mut state = SketchpadState::new(app, worker);

    // Single event loop: requests, timers and finished predictions are all
    // handled on this thread. Inference itself runs on worker threads.
    loop {
        let wait = state.poll_interval(Instant::now());
        match server.recv_timeout(wait) {
            Ok(Some(request)) => routes::dispatch(request, &mut state),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "HTTP server stopped");
                break;
            }
        }
        state.pump(Instant::now());
    }
}
