//! Tunable parameter snapshots
//!
//! Readers clone an `Arc` of the current snapshot; writers build a new
//! snapshot and publish it atomically after an adjustment is applied.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The parameters the optimizer may tune
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningParams {
    /// Supporters needed to promote a fact to STABLE
    pub promotion_threshold: f64,
    /// Idle days before a fact slides one status down
    pub temporal_decay_days: f64,
    /// Default enforcer strictness for non-strict domains
    pub ame_override_strength: f64,
    /// Daily mesh relevance multiplier
    pub smm_decay_rate: f64,
    /// Domain engine confidence threshold
    pub dde_domain_weight: f64,
    /// Per-domain strictness overrides
    pub domain_strictness: HashMap<String, f64>,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            promotion_threshold: 3.0,
            temporal_decay_days: 90.0,
            ame_override_strength: 0.6,
            smm_decay_rate: 0.95,
            dde_domain_weight: 0.7,
            domain_strictness: HashMap::new(),
        }
    }
}

impl TuningParams {
    /// Read one parameter by its stable name
    pub fn get(&self, parameter: &str) -> Option<f64> {
        match parameter {
            "promotion_threshold" => Some(self.promotion_threshold),
            "temporal_decay_days" => Some(self.temporal_decay_days),
            "ame_override_strength" => Some(self.ame_override_strength),
            "smm_decay_rate" => Some(self.smm_decay_rate),
            "dde_domain_weight" => Some(self.dde_domain_weight),
            _ => parameter
                .strip_prefix("strictness:")
                .and_then(|domain| self.domain_strictness.get(domain).copied()),
        }
    }

    /// Write one parameter by its stable name
    pub fn set(&mut self, parameter: &str, value: f64) -> bool {
        match parameter {
            "promotion_threshold" => self.promotion_threshold = value.max(1.0),
            "temporal_decay_days" => self.temporal_decay_days = value.max(1.0),
            "ame_override_strength" => self.ame_override_strength = value.clamp(0.0, 1.0),
            "smm_decay_rate" => self.smm_decay_rate = value.clamp(0.5, 0.99),
            "dde_domain_weight" => self.dde_domain_weight = value.clamp(0.1, 0.99),
            _ => match parameter.strip_prefix("strictness:") {
                Some(domain) => {
                    self.domain_strictness
                        .insert(domain.to_string(), value.clamp(0.0, 1.0));
                },
                None => return false,
            },
        }
        true
    }
}

/// Read-copy-update holder for the live snapshot
pub struct ParameterStore {
    current: RwLock<Arc<TuningParams>>,
}

impl ParameterStore {
    pub fn new(params: TuningParams) -> Self {
        Self {
            current: RwLock::new(Arc::new(params)),
        }
    }

    /// Consistent snapshot for readers
    pub fn snapshot(&self) -> Arc<TuningParams> {
        self.current.read().clone()
    }

    /// Publish a new snapshot atomically
    pub fn publish(&self, params: TuningParams) {
        *self.current.write() = Arc::new(params);
    }

    /// Mutate a copy of the current snapshot and publish it
    pub fn update(&self, parameter: &str, value: f64) -> bool {
        let mut next = (*self.snapshot()).clone();
        let applied = next.set(parameter, value);
        if applied {
            self.publish(next);
        }
        applied
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(TuningParams::default())
    }
}
