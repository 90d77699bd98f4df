//! HTTP inference backend against an in-process stub service.

use std::io::{Cursor, Read};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use digit_scope::inference::LayerId;
use digit_scope::timing::RequestId;
use digit_scope::{HttpBackend, InferenceBackend, InferenceClient, InferenceError, PixelGrid};
use tiny_http::{Header, Method, Response, Server, StatusCode};

#[derive(Clone, Copy)]
enum Mode {
    Classify,
    Reject,
    Garbage,
    Stall,
}

/// Serves `/health` and `/predict` until the test process exits.
fn spawn_stub(mode: Mode, healthy: Arc<AtomicBool>) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let url = request.url().to_owned();
            let reply = match (request.method().clone(), url.as_str()) {
                (Method::Get, "/health") if healthy.load(Ordering::SeqCst) => json(200, r#"{"status":"ok"}"#.into()),
                (Method::Get, "/health") => json(503, r#"{"status":"loading"}"#.into()),
                (Method::Post, "/predict") => {
                    let mut body = String::new();
                    request.as_reader().read_to_string(&mut body).unwrap();
                    let pixels: serde_json::Value = serde_json::from_str(&body).unwrap();
                    let count = pixels["pixels"].as_array().map(|a| a.len()).unwrap_or(0);
                    match mode {
                        Mode::Classify => json(200, classify_body(count)),
                        Mode::Reject => json(200, r#"{"error":"Model not loaded"}"#.into()),
                        Mode::Garbage => json(200, r#"{"digit":12,"confidence":0.5,"probabilities":[]}"#.into()),
                        Mode::Stall => {
                            thread::sleep(Duration::from_millis(800));
                            json(200, classify_body(count))
                        }
                    }
                }
                _ => json(404, r#"{"error":"not found"}"#.into()),
            };
            let _ = request.respond(reply);
        }
    });
    format!("http://{}/", addr)
}

fn classify_body(pixel_count: usize) -> String {
    serde_json::json!({
        "digit": 4,
        "confidence": 0.88,
        "probabilities": [0.01, 0.01, 0.02, 0.01, 0.88, 0.02, 0.01, 0.02, 0.01, 0.01],
        "activations": {
            "input": vec![0.5; pixel_count],
            "hidden1": vec![0.3; 128],
            "hidden2": vec![0.6; 64],
            "output": [0.01, 0.01, 0.02, 0.01, 0.88, 0.02, 0.01, 0.02, 0.01, 0.01]
        }
    })
    .to_string()
}

fn json(status: u16, body: String) -> Response<Cursor<Vec<u8>>> {
    let len = body.len();
    Response::new(
        StatusCode(status),
        vec![Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap()],
        Cursor::new(body.into_bytes()),
        Some(len),
        None,
    )
}

fn backend(url: &str) -> HttpBackend {
    HttpBackend::new(url, Duration::from_secs(2)).unwrap()
}

#[test]
fn handshake_and_predict() {
    let url = spawn_stub(Mode::Classify, Arc::new(AtomicBool::new(true)));
    let backend = backend(&url);
    backend.handshake().unwrap();

    let reply = backend.predict(&PixelGrid::from_values(vec![0.5; 784]).unwrap()).unwrap();
    assert_eq!(reply.prediction.digit, 4);
    assert_eq!(reply.prediction.confidence, 0.88);
    assert_eq!(reply.state.activations.get(LayerId::Input).map(|v| v.len()), Some(784));
    assert_eq!(reply.state.activations.value(LayerId::Hidden2, 10), 0.6);
    assert!(!backend.describe().ends_with('/'));
}

#[test]
fn unhealthy_service_is_offline() {
    let url = spawn_stub(Mode::Classify, Arc::new(AtomicBool::new(false)));
    let err = backend(&url).handshake().unwrap_err();
    assert!(err.is_connectivity());
}

#[test]
fn unreachable_service_is_offline() {
    // Bind and drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let backend = backend(&format!("http://127.0.0.1:{}", port));
    assert!(backend.handshake().unwrap_err().is_connectivity());
    assert!(backend.predict(&PixelGrid::blank()).unwrap_err().is_connectivity());
}

#[test]
fn error_reply_is_rejected_inline() {
    let url = spawn_stub(Mode::Reject, Arc::new(AtomicBool::new(true)));
    let client = InferenceClient::new(Box::new(backend(&url)));
    let err = client.predict(RequestId(1), &PixelGrid::blank()).unwrap_err();
    assert_eq!(err, InferenceError::Rejected("Model not loaded".into()));
    assert_eq!(err.to_string(), "Model not loaded");
    assert!(client.is_ready());
}

#[test]
fn malformed_reply_is_an_inference_error() {
    let url = spawn_stub(Mode::Garbage, Arc::new(AtomicBool::new(true)));
    let err = backend(&url).predict(&PixelGrid::blank()).unwrap_err();
    assert!(matches!(err, InferenceError::Malformed(_)));
}

#[test]
fn slow_service_times_out() {
    let url = spawn_stub(Mode::Stall, Arc::new(AtomicBool::new(true)));
    let backend = HttpBackend::new(&url, Duration::from_millis(200)).unwrap();
    let err = backend.predict(&PixelGrid::blank()).unwrap_err();
    assert_eq!(err, InferenceError::TimedOut);
    assert!(!err.is_connectivity());
}

#[test]
fn client_recovers_when_service_comes_up() {
    let healthy = Arc::new(AtomicBool::new(false));
    let url = spawn_stub(Mode::Classify, healthy.clone());
    let client = InferenceClient::new(Box::new(backend(&url)));
    assert!(!client.initialize());
    assert!(client.predict(RequestId(1), &PixelGrid::blank()).unwrap_err().is_connectivity());

    healthy.store(true, Ordering::SeqCst);
    let p = client.predict(RequestId(2), &PixelGrid::blank()).unwrap();
    assert_eq!(p.digit, 4);
    assert!(client.network_state().is_some());
}
