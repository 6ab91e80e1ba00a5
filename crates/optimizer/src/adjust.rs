//! Adjustment lifecycle
//!
//! An adjustment is proposed against a metric baseline, applied, and
//! after the evaluation window either anchored (kept) or reverted
//! (restored). `PENDING` is only ever an intermediate state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::metrics::MetricKind;

/// Final (or intermediate) outcome of one adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentResult {
    Pending,
    Anchored,
    Reverted,
}

/// One parameter change with its full audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: Uuid,
    pub parameter: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
    /// Metric averages at apply time
    pub baseline: HashMap<MetricKind, f64>,
    pub applied_at: DateTime<Utc>,
    pub result: AdjustmentResult,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Adjustment {
    pub fn new(
        parameter: impl Into<String>,
        old_value: f64,
        new_value: f64,
        reason: impl Into<String>,
        baseline: HashMap<MetricKind, f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parameter: parameter.into(),
            old_value,
            new_value,
            reason: reason.into(),
            baseline,
            applied_at: Utc::now(),
            result: AdjustmentResult::Pending,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.result == AdjustmentResult::Pending
    }

    pub fn resolve(&mut self, result: AdjustmentResult, now: DateTime<Utc>) {
        self.result = result;
        self.resolved_at = Some(now);
    }

    /// Direction-aware relative improvement of `current` over the
    /// baseline, averaged across metrics present in both
    ///
    /// Positive means the system got healthier after this adjustment.
    pub fn improvement(&self, current: &HashMap<MetricKind, f64>) -> Option<f64> {
        let mut deltas = Vec::new();

        for (kind, baseline_value) in &self.baseline {
            let Some(current_value) = current.get(kind) else {
                continue;
            };
            if baseline_value.abs() < 1e-12 {
                continue;
            }
            let relative = (current_value - baseline_value) / baseline_value.abs();
            // Lower-is-better metrics invert
            let delta = if kind.higher_is_better() {
                relative
            } else {
                -relative
            };
            deltas.push(delta);
        }

        if deltas.is_empty() {
            return None;
        }
        Some(deltas.iter().sum::<f64>() / deltas.len() as f64)
    }
}
