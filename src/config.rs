//! Runtime configuration read from `SKETCHPAD_*` environment variables.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::canvas::stroke::{BRUSH_MAX, BRUSH_MIN};
use crate::error::ConfigError;

/// Where predictions come from.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendChoice {
    /// External inference service reached over HTTP.
    Http { base_url: String },
    /// In-process dense network loaded from a JSON model file.
    LocalModel { path: String },
    /// In-process untrained demo network.
    LocalDemo,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the sketchpad host binds to.
    pub bind_addr: String,
    pub backend: BackendChoice,
    /// Upper bound on a single prediction round-trip.
    pub request_timeout: Duration,
    /// Quiet period after the last pointer move before a live prediction.
    pub debounce: Duration,
    pub brush_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1:7878".to_owned(),
            backend: BackendChoice::Http { base_url: "http://127.0.0.1:5000".to_owned() },
            request_timeout: Duration::from_secs(5),
            debounce: Duration::from_millis(100),
            brush_size: 20,
        }
    }
}

impl Config {
    /// Builds the config from the process environment. Invalid values are
    /// logged and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("SKETCHPAD_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(path) = lookup("SKETCHPAD_MODEL") {
            config.backend = if path == "demo" {
                BackendChoice::LocalDemo
            } else {
                BackendChoice::LocalModel { path }
            };
        } else if let Some(url) = lookup("SKETCHPAD_INFERENCE_URL") {
            config.backend = BackendChoice::Http { base_url: url.trim_end_matches('/').to_owned() };
        }

        match parse_millis("SKETCHPAD_TIMEOUT_MS", lookup("SKETCHPAD_TIMEOUT_MS")) {
            Ok(Some(d)) => config.request_timeout = d,
            Ok(None) => {}
            Err(e) => warn!("{}; using {:?}", e, config.request_timeout),
        }

        match parse_millis("SKETCHPAD_DEBOUNCE_MS", lookup("SKETCHPAD_DEBOUNCE_MS")) {
            Ok(Some(d)) => config.debounce = d,
            Ok(None) => {}
            Err(e) => warn!("{}; using {:?}", e, config.debounce),
        }

        match parse_brush(lookup("SKETCHPAD_BRUSH")) {
            Ok(Some(b)) => config.brush_size = b,
            Ok(None) => {}
            Err(e) => warn!("{}; using {}", e, config.brush_size),
        }

        config
    }
}

fn parse_millis(var: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = raw else { return Ok(None) };
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
        _ => Err(ConfigError::Invalid { var, expected: "a positive integer of milliseconds", value }),
    }
}

fn parse_brush(raw: Option<String>) -> Result<Option<u32>, ConfigError> {
    let Some(value) = raw else { return Ok(None) };
    match value.trim().parse::<u32>() {
        Ok(b) if (BRUSH_MIN..=BRUSH_MAX).contains(&b) => Ok(Some(b)),
        _ => Err(ConfigError::Invalid {
            var: "SKETCHPAD_BRUSH",
            expected: "an integer brush diameter within the slider range",
            value,
        }),
    }
}

/// Prints the startup banner.
pub fn print_banner(config: &Config) {
    let backend = match &config.backend {
        BackendChoice::Http { base_url } => format!("http {}", base_url),
        BackendChoice::LocalModel { path } => format!("model {}", path),
        BackendChoice::LocalDemo => "untrained demo network".to_owned(),
    };
    println!("╔══════════════════════════════════════════════╗");
    println!("║          digit-scope sketchpad               ║");
    println!("╠══════════════════════════════════════════════╣");
    println!("║  Open in your browser:                       ║");
    println!("║  http://{:<37}║", config.bind_addr);
    println!("╠══════════════════════════════════════════════╣");
    println!("║  Backend: {:<35}║", backend);
    println!("╚══════════════════════════════════════════════╝");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.bind_addr, "127.0.0.1:7878");
        assert_eq!(config.debounce, Duration::from_millis(100));
        assert_eq!(config.brush_size, 20);
        assert!(matches!(config.backend, BackendChoice::Http { .. }));
    }

    #[test]
    fn model_path_takes_precedence_over_url() {
        let config = Config::from_lookup(lookup_from(&[
            ("SKETCHPAD_MODEL", "trained_models/mnist.json"),
            ("SKETCHPAD_INFERENCE_URL", "http://10.0.0.2:9000/"),
        ]));
        assert_eq!(
            config.backend,
            BackendChoice::LocalModel { path: "trained_models/mnist.json".to_owned() }
        );

        let config = Config::from_lookup(lookup_from(&[("SKETCHPAD_INFERENCE_URL", "http://10.0.0.2:9000/")]));
        assert_eq!(config.backend, BackendChoice::Http { base_url: "http://10.0.0.2:9000".to_owned() });
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("SKETCHPAD_TIMEOUT_MS", "soon"),
            ("SKETCHPAD_DEBOUNCE_MS", "0"),
            ("SKETCHPAD_BRUSH", "400"),
        ]));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.debounce, Duration::from_millis(100));
        assert_eq!(config.brush_size, 20);
    }

    #[test]
    fn parse_brush_reports_variable_name() {
        let err = parse_brush(Some("x".into())).unwrap_err();
        assert!(err.to_string().starts_with("SKETCHPAD_BRUSH"));
    }
}
