//! Per-turn routing log
//!
//! Debugging-only record of layer timings, decisions and errors. Errors
//! here never abort the turn; the log is how swallowed failures stay
//! visible.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use mnemo_core::{Error, ErrorKind};

/// One completed layer invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStep {
    pub layer: String,
    pub duration_ms: u64,
    pub detail: String,
}

/// One swallowed layer failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerError {
    pub layer: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Routing log for one turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingLog {
    pub steps: Vec<LayerStep>,
    pub errors: Vec<LayerError>,
}

impl RoutingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed layer with its wall time
    pub fn step(&mut self, layer: &str, started: Instant, detail: impl Into<String>) {
        self.steps.push(LayerStep {
            layer: layer.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            detail: detail.into(),
        });
    }

    /// Record a swallowed error
    pub fn error(&mut self, layer: &str, error: &Error) {
        self.errors.push(LayerError {
            layer: layer.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_and_error_recording() {
        let mut log = RoutingLog::new();
        let started = Instant::now();
        log.step("domain", started, "classified as identity");
        log.error("graph", &Error::GraphUnavailable("timeout".to_string()));

        assert_eq!(log.steps.len(), 1);
        assert_eq!(log.steps[0].layer, "domain");
        assert!(log.has_errors());
        assert_eq!(log.errors[0].kind, ErrorKind::GraphUnavailable);
    }

    #[test]
    fn test_serializes() {
        let mut log = RoutingLog::new();
        log.step("enforcer", Instant::now(), "override");
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.contains("\"durationMs\""));
    }
}
