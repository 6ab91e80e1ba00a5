//! Append-only observation ledger
//!
//! Observations for one `(domain, key)` are serialized by a per-key async
//! lock held across register-and-aggregate, so append order is the
//! serialization order of conflict resolution.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use mnemo_core::Observation;

type KeyId = (String, String);

/// Append-only store of raw observations
#[derive(Default)]
pub struct ObservationLedger {
    observations: DashMap<KeyId, Vec<Observation>>,
    locks: DashMap<KeyId, Arc<Mutex<()>>>,
}

impl ObservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-key lock guarding register-and-aggregate
    pub fn key_lock(&self, domain: &str, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry((domain.to_string(), key.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append one observation; never mutates earlier entries
    pub fn append(&self, observation: Observation) {
        let key = (observation.domain.clone(), observation.key.clone());
        self.observations.entry(key).or_default().push(observation);
    }

    /// All observations for one key, in append order
    pub fn observations_for(&self, domain: &str, key: &str) -> Vec<Observation> {
        self.observations
            .get(&(domain.to_string(), key.to_string()))
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Keys that have at least one observation, optionally filtered by
    /// domain
    pub fn keys(&self, domain: Option<&str>) -> Vec<(String, String)> {
        self.observations
            .iter()
            .filter(|e| domain.map(|d| e.key().0 == d).unwrap_or(true))
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn total_observations(&self) -> usize {
        self.observations.iter().map(|e| e.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::{Authority, ObservationSource};

    fn obs(value: &str) -> Observation {
        Observation::new(
            "identity",
            "name",
            value,
            ObservationSource::ChatUser,
            Authority::ShortTerm,
        )
    }

    #[test]
    fn test_append_order_preserved() {
        let ledger = ObservationLedger::new();
        ledger.append(obs("Morten"));
        ledger.append(obs("Morpheus"));
        ledger.append(obs("Morten"));

        let all = ledger.observations_for("identity", "name");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].value, "Morten");
        assert_eq!(all[1].value, "Morpheus");
        assert_eq!(all[2].value, "Morten");
    }

    #[test]
    fn test_keys_filtered_by_domain() {
        let ledger = ObservationLedger::new();
        ledger.append(obs("Morten"));
        ledger.append(Observation::new(
            "family",
            "child_1",
            "Anna",
            ObservationSource::ChatUser,
            Authority::ShortTerm,
        ));

        assert_eq!(ledger.keys(None).len(), 2);
        assert_eq!(ledger.keys(Some("family")).len(), 1);
        assert_eq!(ledger.total_observations(), 2);
    }

    #[test]
    fn test_key_lock_identity() {
        let ledger = ObservationLedger::new();
        let a = ledger.key_lock("identity", "name");
        let b = ledger.key_lock("identity", "name");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
