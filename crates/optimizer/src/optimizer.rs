//! Optimizer facade
//!
//! One `run_cycle` proposes and applies bounded adjustments for degraded
//! metrics; `evaluate_adjustments` later anchors or reverts them against
//! their baselines.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use mnemo_config::OptimizerConfig;
use mnemo_core::{Error, Result};

use crate::adjust::{Adjustment, AdjustmentResult};
use crate::metrics::{MetricKind, SystemObserver};
use crate::params::{ParameterStore, TuningParams};

/// Serializable optimizer state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OptimizerSnapshot {
    params: TuningParams,
    adjustments: Vec<Adjustment>,
}

/// Self-optimizing controller
pub struct SelfOptimizer {
    config: OptimizerConfig,
    observer: SystemObserver,
    params: ParameterStore,
    adjustments: Mutex<Vec<Adjustment>>,
}

impl SelfOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let observer = SystemObserver::new(config.metric_buffer_capacity);
        Self {
            config,
            observer,
            params: ParameterStore::default(),
            adjustments: Mutex::new(Vec::new()),
        }
    }

    pub fn record_metric(&self, kind: MetricKind, value: f64) {
        self.observer.record(kind, value);
    }

    pub fn observer(&self) -> &SystemObserver {
        &self.observer
    }

    /// Current parameter snapshot (RCU read)
    pub fn params(&self) -> std::sync::Arc<TuningParams> {
        self.params.snapshot()
    }

    /// Which parameter a degraded metric adjusts, and in which direction
    fn remedy(kind: MetricKind) -> (&'static str, f64) {
        match kind {
            // Overriding too much: weaken the default strictness
            MetricKind::OverrideRate => ("ame_override_strength", -1.0),
            // Conflict churn: demand more support before truth flips
            MetricKind::ConflictRate => ("promotion_threshold", 1.0),
            // Inaccurate truths: age them out faster
            MetricKind::Accuracy => ("temporal_decay_days", -1.0),
            // Weak classification: lower the acceptance bar
            MetricKind::DomainQuality => ("dde_domain_weight", -1.0),
            // Poor retrieval: slow the mesh decay
            MetricKind::MemoryHitRate => ("smm_decay_rate", 1.0),
        }
    }

    /// One optimization cycle: snapshot, propose, apply
    ///
    /// Returns the adjustments applied this cycle. Parameters with a
    /// pending adjustment are skipped until it resolves.
    pub fn run_cycle(&self) -> Vec<Adjustment> {
        let baseline = self.observer.snapshot();
        let mut applied = Vec::new();
        let mut history = self.adjustments.lock();

        for (kind, value) in &baseline {
            if !kind.degraded(*value) {
                continue;
            }
            let (parameter, direction) = Self::remedy(*kind);

            let pending_exists = history
                .iter()
                .any(|a| a.parameter == parameter && a.is_pending());
            if pending_exists {
                continue;
            }

            let Some(old_value) = self.params.snapshot().get(parameter) else {
                continue;
            };
            let proposed = old_value * (1.0 + direction * self.config.max_adjustment_ratio);

            if !self.params.update(parameter, proposed) {
                continue;
            }
            // Clamping may have bounded the proposal
            let new_value = self
                .params
                .snapshot()
                .get(parameter)
                .unwrap_or(proposed);
            if (new_value - old_value).abs() < 1e-12 {
                continue;
            }

            let adjustment = Adjustment::new(
                parameter,
                old_value,
                new_value,
                format!("{} degraded at {:.3}", kind.as_str(), value),
                baseline.clone(),
            );

            tracing::debug!(
                parameter,
                old_value,
                new_value,
                metric = kind.as_str(),
                "Applied parameter adjustment"
            );
            applied.push(adjustment.clone());
            history.push(adjustment);
        }

        applied
    }

    /// Judge adjustments whose evaluation window has elapsed
    ///
    /// Better than baseline by the anchor threshold: ANCHORED. Worse by
    /// the same margin: REVERTED (old value restored). Otherwise the
    /// adjustment stays pending for one more window, after which the
    /// outcome is forced so nothing is ever left unresolved.
    pub fn evaluate_adjustments(&self, now: DateTime<Utc>) -> usize {
        let current = self.observer.snapshot();
        let window = Duration::hours(self.config.evaluation_window_hours as i64);
        let mut resolved = 0;
        let mut reverts: Vec<(String, f64)> = Vec::new();

        {
            let mut history = self.adjustments.lock();
            for adjustment in history.iter_mut().filter(|a| a.is_pending()) {
                if now < adjustment.applied_at + window {
                    continue;
                }

                let improvement = adjustment.improvement(&current);
                let past_deadline = now >= adjustment.applied_at + window * 2;

                let outcome = match improvement {
                    Some(delta) if delta > self.config.anchor_threshold => {
                        Some(AdjustmentResult::Anchored)
                    },
                    Some(delta) if delta < -self.config.anchor_threshold => {
                        Some(AdjustmentResult::Reverted)
                    },
                    _ if past_deadline => {
                        // Inconclusive twice: keep it only if not worse
                        if improvement.unwrap_or(0.0) >= 0.0 {
                            Some(AdjustmentResult::Anchored)
                        } else {
                            Some(AdjustmentResult::Reverted)
                        }
                    },
                    // OPTIMIZATION_INCONCLUSIVE: re-evaluate next cycle
                    _ => None,
                };

                if let Some(outcome) = outcome {
                    adjustment.resolve(outcome, now);
                    resolved += 1;
                    if outcome == AdjustmentResult::Reverted {
                        reverts.push((adjustment.parameter.clone(), adjustment.old_value));
                    }
                    tracing::debug!(
                        parameter = %adjustment.parameter,
                        ?outcome,
                        "Resolved adjustment"
                    );
                }
            }
        }

        for (parameter, old_value) in reverts {
            self.params.update(&parameter, old_value);
        }

        resolved
    }

    /// Full adjustment history
    pub fn history(&self) -> Vec<Adjustment> {
        self.adjustments.lock().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.adjustments.lock().iter().filter(|a| a.is_pending()).count()
    }

    /// Write state atomically (write-temp-then-rename)
    pub fn persist(&self, path: &Path) -> Result<()> {
        let snapshot = OptimizerSnapshot {
            params: (*self.params.snapshot()).clone(),
            adjustments: self.adjustments.lock().clone(),
        };
        let json =
            serde_json::to_vec_pretty(&snapshot).map_err(|e| Error::Persistence(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Persistence(e.to_string()))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| Error::Persistence(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Restore state from a snapshot file
    pub fn restore(&self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| Error::Persistence(e.to_string()))?;
        let snapshot: OptimizerSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| Error::Persistence(e.to_string()))?;
        self.params.publish(snapshot.params);
        *self.adjustments.lock() = snapshot.adjustments;
        Ok(())
    }

    /// For tests: backdate an adjustment so its window has elapsed
    #[cfg(test)]
    fn backdate_pending(&self, hours: i64) {
        for adjustment in self.adjustments.lock().iter_mut() {
            if adjustment.is_pending() {
                adjustment.applied_at = adjustment.applied_at - Duration::hours(hours);
            }
        }
    }
}
