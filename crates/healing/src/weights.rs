//! Aggregation weights
//!
//! The defaults are the normative constants; the optimizer may publish
//! adjusted copies later, which is why these are data rather than match
//! arms on the enums themselves.

use serde::{Deserialize, Serialize};

use mnemo_core::{Authority, ObservationSource};

/// Authority and source weight table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationWeights {
    pub test: f64,
    pub short_term: f64,
    pub medium_term: f64,
    pub stable: f64,
    pub long_term: f64,

    pub cli_test: f64,
    pub chat_user: f64,
    pub memory_enhancement: f64,
    pub system_default: f64,
    pub ingest_doc: f64,
}

impl Default for AggregationWeights {
    fn default() -> Self {
        Self {
            test: 0.1,
            short_term: 1.0,
            medium_term: 2.0,
            stable: 5.0,
            long_term: 10.0,

            cli_test: 0.1,
            chat_user: 1.0,
            memory_enhancement: 1.5,
            system_default: 2.0,
            ingest_doc: 3.0,
        }
    }
}

impl AggregationWeights {
    pub fn authority(&self, authority: Authority) -> f64 {
        match authority {
            Authority::Test => self.test,
            Authority::ShortTerm => self.short_term,
            Authority::MediumTerm => self.medium_term,
            Authority::Stable => self.stable,
            Authority::LongTerm => self.long_term,
        }
    }

    pub fn source(&self, source: ObservationSource) -> f64 {
        match source {
            ObservationSource::CliTest => self.cli_test,
            ObservationSource::ChatUser => self.chat_user,
            ObservationSource::MemoryEnhancement => self.memory_enhancement,
            ObservationSource::SystemDefault => self.system_default,
            ObservationSource::IngestDoc => self.ingest_doc,
        }
    }
}

/// Linear age falloff over a year, floored at 0.1
pub fn temporal_factor(age_days: i64) -> f64 {
    (1.0 - age_days as f64 / 365.0).max(0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = AggregationWeights::default();
        assert_eq!(weights.authority(Authority::Test), 0.1);
        assert_eq!(weights.authority(Authority::LongTerm), 10.0);
        assert_eq!(weights.source(ObservationSource::CliTest), 0.1);
        assert_eq!(weights.source(ObservationSource::IngestDoc), 3.0);
    }

    #[test]
    fn test_cli_test_isolation_constant() {
        let weights = AggregationWeights::default();
        let test_weight = weights.authority(Authority::Test) * weights.source(ObservationSource::CliTest);
        let user_weight =
            weights.authority(Authority::ShortTerm) * weights.source(ObservationSource::ChatUser);
        assert!((test_weight - 0.01).abs() < 1e-9);
        assert!((user_weight - 1.0).abs() < 1e-9);
        // Even 99 test observations lose to one user observation
        assert!(99.0 * test_weight < user_weight);
    }

    #[test]
    fn test_temporal_factor() {
        assert_eq!(temporal_factor(0), 1.0);
        assert!((temporal_factor(365) - 0.1).abs() < 1e-9);
        // Floor holds for arbitrarily old observations
        assert_eq!(temporal_factor(10_000), 0.1);
    }
}
