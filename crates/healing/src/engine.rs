//! Truth engine
//!
//! The single writer of canonical facts. Every asserted fact enters as an
//! observation; the engine aggregates the observation set for the key,
//! resolves conflicts synchronously, commits the winner to the canonical
//! store and propagates invalidation to dependent facts.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use mnemo_canonical::{CanonicalStore, FactDraft, KeyDecision};
use mnemo_config::HealingConfig;
use mnemo_core::{
    Authority, Conflict, ConflictResolution, Fact, FactStatus, Observation, ObservationSource,
    Result,
};

use crate::causality::CausalityGraph;
use crate::confidence::ConfidenceAdjuster;
use crate::ledger::ObservationLedger;
use crate::resolution::{pick_winner, support_weights, WinnerKind};
use crate::weights::AggregationWeights;

/// Self-healing truth engine over the canonical store
pub struct TruthEngine {
    canonical: Arc<CanonicalStore>,
    ledger: ObservationLedger,
    weights: RwLock<AggregationWeights>,
    adjuster: RwLock<ConfidenceAdjuster>,
    causality: CausalityGraph,
    conflicts: Mutex<Vec<Conflict>>,
    promotion_threshold: RwLock<u32>,
    min_confidence: f64,
}

impl TruthEngine {
    pub fn new(canonical: Arc<CanonicalStore>, config: HealingConfig, min_confidence: f64) -> Self {
        Self {
            canonical,
            ledger: ObservationLedger::new(),
            weights: RwLock::new(AggregationWeights::default()),
            adjuster: RwLock::new(ConfidenceAdjuster::new(
                min_confidence,
                config.temporal_decay_days,
            )),
            causality: CausalityGraph::new(),
            conflicts: Mutex::new(Vec::new()),
            promotion_threshold: RwLock::new(config.promotion_threshold),
            min_confidence,
        }
    }

    pub fn canonical(&self) -> Arc<CanonicalStore> {
        self.canonical.clone()
    }

    pub fn causality(&self) -> &CausalityGraph {
        &self.causality
    }

    /// Observation-path fact assertion (the default store path)
    pub async fn store_fact(&self, draft: FactDraft) -> Result<Fact> {
        self.register_observation(
            &draft.domain,
            &draft.key,
            &draft.value,
            draft.source,
            draft.authority,
        )
        .await
    }

    /// Append one observation and re-aggregate its key
    ///
    /// Returns the canonical fact after aggregation. Append order under
    /// the per-key lock is the serialization order of conflict resolution.
    pub async fn register_observation(
        &self,
        domain: &str,
        key: &str,
        value: &str,
        source: ObservationSource,
        authority: Authority,
    ) -> Result<Fact> {
        let decision = self.canonical.schema().admit(domain, key, value)?;
        let key = match decision {
            KeyDecision::Accepted => key.to_lowercase(),
            KeyDecision::Normalized(known) => known,
        };
        let domain = domain.to_lowercase();

        let lock = self.ledger.key_lock(&domain, &key);
        let _guard = lock.lock().await;

        self.ledger
            .append(Observation::new(&domain, &key, value, source, authority));

        self.aggregate_key(&domain, &key).await
    }

    /// Current canonical value, or None
    pub fn get_canonical_truth(&self, domain: &str, key: &str) -> Option<Fact> {
        self.canonical.get_fact(domain, key)
    }

    /// Open conflicts, optionally restricted to one domain
    pub fn detect_conflicts(&self, domain: Option<&str>) -> Vec<Conflict> {
        self.conflicts
            .lock()
            .iter()
            .filter(|c| c.open)
            .filter(|c| domain.map(|d| c.domain == d).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Full conflict history
    pub fn conflict_history(&self) -> Vec<Conflict> {
        self.conflicts.lock().clone()
    }

    /// Conflicts detected in the trailing window
    pub fn conflicts_since(&self, cutoff: chrono::DateTime<chrono::Utc>) -> usize {
        self.conflicts
            .lock()
            .iter()
            .filter(|c| c.detected_at >= cutoff)
            .count()
    }

    /// Reinforce a fact after it successfully grounded a reply
    pub fn mark_used(&self, domain: &str, key: &str) {
        if let Some(mut fact) = self.canonical.get_fact(domain, key) {
            self.adjuster.read().reinforce(&mut fact);
            self.canonical.update_fact(&fact);
        }
    }

    /// Refute a fact; below the confidence floor it turns SUSPECT
    pub fn refute(&self, domain: &str, key: &str) {
        if let Some(mut fact) = self.canonical.get_fact(domain, key) {
            self.adjuster.read().refute(&mut fact);
            self.canonical.update_fact(&fact);
        }
    }

    /// Record that `dependent` was derived from `dependency`
    pub fn add_dependency(&self, dependent: &Fact, dependency: &Fact) {
        self.causality.add_dependency(dependent.id, dependency.id);
    }

    /// Periodic status decay per the adjuster schedule
    ///
    /// Facts that reach DEPRECATED have their dependents marked SUSPECT.
    pub fn apply_temporal_decay(&self) -> usize {
        let adjuster = self.adjuster.read().clone();
        let mut slid = 0;

        for mut fact in self.canonical.all_facts() {
            if adjuster.decay_if_idle(&mut fact) {
                slid += 1;
                self.canonical.update_fact(&fact);
                if fact.status == FactStatus::Deprecated {
                    self.suspect_dependents(&fact);
                }
            }
        }

        if slid > 0 {
            tracing::debug!(facts = slid, "Temporal decay slid fact statuses");
        }
        slid
    }

    /// Purge deprecated facts for a key once their dependents are also
    /// invalidated
    pub async fn purge_invalidated(&self, domain: &str, key: &str) -> Result<usize> {
        let deprecated: Vec<Fact> = self
            .canonical
            .facts_for_key(domain, key)
            .into_iter()
            .filter(|f| f.status == FactStatus::Deprecated)
            .collect();

        let all = self.canonical.all_facts();
        for fact in &deprecated {
            for dependent_id in self.causality.dependents_of(fact.id) {
                let still_canonical = all
                    .iter()
                    .any(|f| f.id == dependent_id && f.status.is_canonical());
                if still_canonical {
                    // Retained for audit until dependents are invalidated
                    return Ok(0);
                }
            }
        }

        self.canonical.purge_deprecated(domain, key).await
    }

    /// Publish adjusted aggregation weights (optimizer sync-point)
    pub fn set_weights(&self, weights: AggregationWeights) {
        *self.weights.write() = weights;
    }

    /// Publish a new decay threshold (optimizer sync-point)
    pub fn set_decay_threshold_days(&self, days: i64) {
        *self.adjuster.write() = ConfidenceAdjuster::new(self.min_confidence, days);
    }

    /// Publish a new promotion threshold (optimizer sync-point)
    pub fn set_promotion_threshold(&self, threshold: u32) {
        *self.promotion_threshold.write() = threshold;
    }

    pub fn total_observations(&self) -> usize {
        self.ledger.total_observations()
    }

    /// Re-aggregate one key from its full observation set
    async fn aggregate_key(&self, domain: &str, key: &str) -> Result<Fact> {
        let observations = self.ledger.observations_for(domain, key);
        let weights = self.weights.read().clone();
        let supports = support_weights(&observations, &weights);

        let Some((winner, kind)) = pick_winner(&supports) else {
            return Err(mnemo_core::Error::NotFound(format!(
                "no observations for {}.{}",
                domain, key
            )));
        };

        let total_weight: f64 = supports.iter().map(|s| s.weight).sum();
        let share = if total_weight > 0.0 {
            winner.weight / total_weight
        } else {
            1.0
        };
        let confidence = share.clamp(self.min_confidence, 1.0);
        let promoted = winner.supporters >= *self.promotion_threshold.read() as usize;

        let current = self.canonical.get_fact(domain, key);

        match current {
            Some(mut fact) if fact.value == winner.value => {
                // Reinforcement of the standing truth
                fact.support_count = winner.supporters as u32;
                fact.authority = winner.max_authority;
                fact.confidence = fact.confidence.max(confidence);
                self.adjuster.read().reinforce(&mut fact);
                if promoted && fact.status == FactStatus::Active {
                    fact.status = FactStatus::Stable;
                }
                self.canonical.update_fact(&fact);
                Ok(fact)
            },
            Some(loser) => {
                // Competing value took over: synchronous conflict resolution
                let mut conflict = Conflict::new(
                    domain,
                    key,
                    supports.iter().map(|s| s.value.clone()).collect(),
                );
                let resolution_kind = match kind {
                    WinnerKind::ByWeight => ConflictResolution::WeightedSupport,
                    WinnerKind::ByTieBreak => ConflictResolution::NewestWins,
                };
                conflict.resolve(&winner.value, resolution_kind.clone());

                let winner_fact = self
                    .commit_winner(domain, key, winner.value.clone(), confidence, winner, promoted)
                    .await?;

                // commit_winner deprecated the loser; a tie keeps it
                // suspect instead and leaves the conflict open
                if resolution_kind == ConflictResolution::NewestWins {
                    let mut suspect = loser.clone();
                    suspect.status = FactStatus::Suspect;
                    self.canonical.update_fact(&suspect);
                } else {
                    self.suspect_dependents(&loser);
                }

                tracing::debug!(
                    domain = %domain,
                    key = %key,
                    winner = %winner.value,
                    loser = %loser.value,
                    ?resolution_kind,
                    "Resolved fact conflict"
                );

                self.conflicts.lock().push(conflict);
                Ok(winner_fact)
            },
            None => {
                self.commit_winner(domain, key, winner.value.clone(), confidence, winner, promoted)
                    .await
            },
        }
    }

    async fn commit_winner(
        &self,
        domain: &str,
        key: &str,
        value: String,
        confidence: f64,
        winner: &crate::resolution::ValueSupport,
        promoted: bool,
    ) -> Result<Fact> {
        // Revive an existing audit copy of this value when present
        let existing = self
            .canonical
            .facts_for_key(domain, key)
            .into_iter()
            .find(|f| f.value == value);

        let mut fact = match existing {
            Some(mut fact) => {
                fact.touch();
                fact
            },
            None => Fact::new(domain, key, value),
        };
        fact.confidence = confidence;
        fact.support_count = winner.supporters as u32;
        fact.authority = winner.max_authority;
        fact.status = if promoted {
            FactStatus::Stable
        } else {
            FactStatus::Active
        };

        let embedding_text = format!("{} {} {}", fact.domain, fact.key, fact.value);
        self.canonical
            .commit_canonical(fact.clone(), &embedding_text)
            .await?;
        Ok(fact)
    }

    /// Mark all transitive dependents of an invalidated fact SUSPECT
    fn suspect_dependents(&self, invalidated: &Fact) {
        let affected = self.causality.propagate_invalidation(invalidated.id);
        if affected.is_empty() {
            return;
        }

        for mut fact in self.canonical.all_facts() {
            if affected.contains(&fact.id) && fact.status.is_canonical() {
                fact.status = FactStatus::Suspect;
                self.canonical.update_fact(&fact);
            }
        }

        tracing::debug!(
            invalidated = %invalidated.id,
            dependents = affected.len(),
            "Marked dependents suspect"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_config::CanonicalConfig;
    use mnemo_store::{InMemoryIndex, SimpleEmbedder};

    fn engine() -> TruthEngine {
        let canonical = Arc::new(CanonicalStore::new(
            CanonicalConfig::default(),
            Arc::new(InMemoryIndex::new()),
            Arc::new(SimpleEmbedder::new(128)),
        ));
        TruthEngine::new(canonical, HealingConfig::default(), 0.6)
    }

    async fn observe(
        engine: &TruthEngine,
        value: &str,
        source: ObservationSource,
        authority: Authority,
    ) -> Result<Fact> {
        engine
            .register_observation("identity", "name", value, source, authority)
            .await
    }

    #[tokio::test]
    async fn test_first_observation_becomes_truth() {
        let engine = engine();
        let fact = observe(&engine, "Morten", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();

        assert_eq!(fact.value, "Morten");
        assert!(fact.is_canonical());
        assert_eq!(
            engine.get_canonical_truth("identity", "name").unwrap().value,
            "Morten"
        );
    }

    #[tokio::test]
    async fn test_cli_tests_never_unseat_user_truth() {
        let engine = engine();
        for _ in 0..10 {
            observe(&engine, "Morpheus", ObservationSource::CliTest, Authority::Test)
                .await
                .unwrap();
        }
        for _ in 0..3 {
            observe(&engine, "Morten", ObservationSource::ChatUser, Authority::ShortTerm)
                .await
                .unwrap();
        }
        // Another test burst changes nothing
        for _ in 0..50 {
            observe(&engine, "Morpheus", ObservationSource::CliTest, Authority::Test)
                .await
                .unwrap();
        }

        let truth = engine.get_canonical_truth("identity", "name").unwrap();
        assert_eq!(truth.value, "Morten");
    }

    #[tokio::test]
    async fn test_repeated_observations_reinforce() {
        let engine = engine();
        let first = observe(&engine, "Morten", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();
        let second = observe(&engine, "Morten", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();
        let third = observe(&engine, "Morten", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();

        assert_eq!(second.support_count, 2);
        assert_eq!(third.support_count, 3);
        assert!(second.confidence >= first.confidence);
        assert!(third.confidence >= second.confidence);
        // Promotion threshold (3 supporters) reached
        assert_eq!(third.status, FactStatus::Stable);
    }

    #[tokio::test]
    async fn test_conflict_resolution_deprecates_loser() {
        let engine = engine();
        observe(&engine, "Oslo", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();
        // Stronger authority takes over
        observe(&engine, "Bergen", ObservationSource::IngestDoc, Authority::Stable)
            .await
            .unwrap();

        let truth = engine.get_canonical_truth("identity", "name").unwrap();
        assert_eq!(truth.value, "Bergen");

        let all = engine.canonical().facts_for_key("identity", "name");
        let loser = all.iter().find(|f| f.value == "Oslo").unwrap();
        assert_eq!(loser.status, FactStatus::Deprecated);

        // The resolved conflict is recorded and closed
        let history = engine.conflict_history();
        assert_eq!(history.len(), 1);
        assert!(!history[0].open);
        assert_eq!(history[0].resolution.as_deref(), Some("Bergen"));
    }

    #[tokio::test]
    async fn test_tied_conflict_stays_open() {
        let engine = engine();
        observe(&engine, "Oslo", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();
        observe(&engine, "Bergen", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();

        // Newest wins the tie, loser is suspect not deprecated
        let truth = engine.get_canonical_truth("identity", "name").unwrap();
        assert_eq!(truth.value, "Bergen");

        let all = engine.canonical().facts_for_key("identity", "name");
        let loser = all.iter().find(|f| f.value == "Oslo").unwrap();
        assert_eq!(loser.status, FactStatus::Suspect);

        let open = engine.detect_conflicts(Some("identity"));
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn test_authority_bounded_by_observations() {
        let engine = engine();
        let fact = observe(&engine, "Morten", ObservationSource::ChatUser, Authority::MediumTerm)
            .await
            .unwrap();
        assert_eq!(fact.authority, Authority::MediumTerm);

        let fact = observe(&engine, "Morten", ObservationSource::IngestDoc, Authority::LongTerm)
            .await
            .unwrap();
        assert_eq!(fact.authority, Authority::LongTerm);
    }

    #[tokio::test]
    async fn test_reclaimed_truth_revives_audit_copy() {
        let engine = engine();
        observe(&engine, "Oslo", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();
        observe(&engine, "Bergen", ObservationSource::IngestDoc, Authority::Stable)
            .await
            .unwrap();
        // Overwhelming user support flips it back
        for _ in 0..20 {
            observe(&engine, "Oslo", ObservationSource::ChatUser, Authority::ShortTerm)
                .await
                .unwrap();
        }

        let truth = engine.get_canonical_truth("identity", "name").unwrap();
        assert_eq!(truth.value, "Oslo");
        // No duplicate Oslo facts were created
        let all = engine.canonical().facts_for_key("identity", "name");
        assert_eq!(all.iter().filter(|f| f.value == "Oslo").count(), 1);
    }

    #[tokio::test]
    async fn test_dependent_marked_suspect_on_conflict_loss() {
        let engine = engine();
        let base = observe(&engine, "Oslo", ObservationSource::ChatUser, Authority::ShortTerm)
            .await
            .unwrap();

        let derived = engine
            .register_observation(
                "assistant",
                "timezone",
                "Europe/Oslo",
                ObservationSource::MemoryEnhancement,
                Authority::ShortTerm,
            )
            .await
            .unwrap();
        engine.add_dependency(&derived, &base);

        // Base fact loses to stronger evidence
        observe(&engine, "Bergen", ObservationSource::IngestDoc, Authority::Stable)
            .await
            .unwrap();

        let timezone = engine
            .canonical()
            .facts_for_key("assistant", "timezone")
            .into_iter()
            .find(|f| f.value == "Europe/Oslo")
            .unwrap();
        assert_eq!(timezone.status, FactStatus::Suspect);
        assert_eq!(engine.causality().cause_of(timezone.id), Some(base.id));
    }

    #[tokio::test]
    async fn test_schema_rejection_blocks_observation() {
        let engine = engine();
        let result = engine
            .register_observation(
                "identity",
                "password",
                "hunter2",
                ObservationSource::ChatUser,
                Authority::ShortTerm,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(engine.total_observations(), 0);
    }
}
