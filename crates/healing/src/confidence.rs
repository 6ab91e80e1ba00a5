//! Confidence adjustment
//!
//! Reinforcement nudges confidence toward 1.0, refutation halves it, and
//! idle facts slide down the status ladder on the periodic decay pass:
//! STABLE -> ACTIVE -> SUSPECT -> DEPRECATED.

use mnemo_core::{Fact, FactStatus};

/// Reinforcement step size
const REINFORCEMENT_ALPHA: f64 = 0.05;

/// Refutation multiplier
const REFUTATION_FACTOR: f64 = 0.5;

/// Confidence adjuster over individual facts
#[derive(Debug, Clone)]
pub struct ConfidenceAdjuster {
    /// Below this, refuted facts turn SUSPECT
    min_confidence: f64,
    /// Facts idle longer than this slide one status down
    decay_threshold_days: i64,
}

impl ConfidenceAdjuster {
    pub fn new(min_confidence: f64, decay_threshold_days: i64) -> Self {
        Self {
            min_confidence,
            decay_threshold_days,
        }
    }

    /// Successful use: `c <- min(1, c + alpha * (1 - c))`
    pub fn reinforce(&self, fact: &mut Fact) {
        fact.confidence = (fact.confidence + REINFORCEMENT_ALPHA * (1.0 - fact.confidence)).min(1.0);
    }

    /// Refutation: halve confidence; below the floor the fact turns
    /// SUSPECT
    pub fn refute(&self, fact: &mut Fact) {
        fact.confidence *= REFUTATION_FACTOR;
        if fact.confidence < self.min_confidence && fact.status.is_canonical() {
            fact.status = FactStatus::Suspect;
        }
    }

    /// Periodic decay: idle facts slide one status down
    ///
    /// Returns true when the fact changed status. A fact that reaches
    /// DEPRECATED here must have its dependents invalidated by the caller.
    pub fn decay_if_idle(&self, fact: &mut Fact) -> bool {
        if fact.idle_days() <= self.decay_threshold_days {
            return false;
        }

        let next = match fact.status {
            FactStatus::Stable => FactStatus::Active,
            FactStatus::Active => FactStatus::Suspect,
            FactStatus::Suspect => FactStatus::Deprecated,
            FactStatus::Deprecated => return false,
        };
        fact.status = next;
        true
    }

    pub fn decay_threshold_days(&self) -> i64 {
        self.decay_threshold_days
    }
}
