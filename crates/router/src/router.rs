//! Router construction and the per-turn pipeline

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use mnemo_canonical::CanonicalStore;
use mnemo_config::Settings;
use mnemo_core::{
    Authority, ChunkRole, DomainSignal, Error, Fact, GraphStore, LanguageModel,
    ObservationSource, Result, TextEmbedder, VectorIndex,
};
use mnemo_cortex::{MetaCortex, PatternObservation};
use mnemo_domain::DomainEngine;
use mnemo_enforcer::{extract_assertions, Decision, MemoryEnforcer};
use mnemo_graph::InMemoryGraph;
use mnemo_healing::TruthEngine;
use mnemo_llm::ContradictionProbe;
use mnemo_mesh::SemanticMesh;
use mnemo_optimizer::{MetricKind, SelfOptimizer};
use mnemo_store::{CachedEmbedder, InMemoryIndex, SimpleEmbedder};

use crate::response::{
    ChatTurnRequest, ChatTurnResponse, MemoryCounts, StoredInfo, TurnMetadata,
};
use crate::routing_log::RoutingLog;

/// Question shapes recorded as reasoning patterns for the cortex
const QUESTION_SHAPES: [&str; 8] = [
    "what is",
    "who are",
    "who is",
    "where do",
    "where is",
    "when did",
    "how many",
    "how old",
];

/// Builder wiring the layers together
///
/// Defaults are fully offline: deterministic embedder, in-memory vector
/// indexes and graph, no LLM probe (structural checks only).
pub struct MemoryRouterBuilder {
    settings: Settings,
    embedder: Option<Arc<dyn TextEmbedder>>,
    fact_index: Option<Arc<dyn VectorIndex>>,
    chunk_index: Option<Arc<dyn VectorIndex>>,
    llm: Option<Arc<dyn LanguageModel>>,
    graph: Option<Arc<dyn GraphStore>>,
}

impl MemoryRouterBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            embedder: None,
            fact_index: None,
            chunk_index: None,
            llm: None,
            graph: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_fact_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.fact_index = Some(index);
        self
    }

    pub fn with_chunk_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.chunk_index = Some(index);
        self
    }

    pub fn with_language_model(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_graph(mut self, graph: Arc<dyn GraphStore>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn build(self) -> MemoryRouter {
        let settings = self.settings;

        let raw_embedder = self
            .embedder
            .unwrap_or_else(|| Arc::new(SimpleEmbedder::new(settings.embedding.dimension)));
        let embedder: Arc<dyn TextEmbedder> = Arc::new(CachedEmbedder::new(
            raw_embedder,
            settings.embedding.cache_capacity,
        ));

        let fact_index = self.fact_index.unwrap_or_else(|| Arc::new(InMemoryIndex::new()));
        let chunk_index = self.chunk_index.unwrap_or_else(|| Arc::new(InMemoryIndex::new()));
        let graph = self.graph.unwrap_or_else(|| Arc::new(InMemoryGraph::new()));

        let canonical = Arc::new(CanonicalStore::new(
            settings.canonical.clone(),
            fact_index,
            embedder.clone(),
        ));
        let truth = Arc::new(TruthEngine::new(
            canonical.clone(),
            settings.healing.clone(),
            settings.canonical.min_confidence,
        ));
        let mesh = Arc::new(SemanticMesh::new(
            settings.mesh.clone(),
            chunk_index,
            embedder.clone(),
        ));
        let domain_engine = Arc::new(DomainEngine::new(settings.domain.clone(), embedder.clone()));

        let probe = self
            .llm
            .map(|llm| ContradictionProbe::new(llm, settings.llm.protection_temperature));
        let enforcer = Arc::new(MemoryEnforcer::new(settings.enforcer.clone(), probe));

        let cortex = Arc::new(MetaCortex::new(settings.cortex.clone()));
        let optimizer = Arc::new(SelfOptimizer::new(settings.optimizer.clone()));

        MemoryRouter {
            settings,
            canonical,
            truth,
            mesh,
            domain_engine,
            enforcer,
            cortex,
            optimizer,
            graph,
        }
    }
}

/// The per-turn orchestrator
pub struct MemoryRouter {
    settings: Settings,
    canonical: Arc<CanonicalStore>,
    truth: Arc<TruthEngine>,
    mesh: Arc<SemanticMesh>,
    domain_engine: Arc<DomainEngine>,
    enforcer: Arc<MemoryEnforcer>,
    cortex: Arc<MetaCortex>,
    optimizer: Arc<SelfOptimizer>,
    graph: Arc<dyn GraphStore>,
}

impl MemoryRouter {
    pub fn builder(settings: Settings) -> MemoryRouterBuilder {
        MemoryRouterBuilder::new(settings)
    }

    /// Fully offline router with default settings
    pub fn offline() -> Self {
        MemoryRouterBuilder::new(Settings::default()).build()
    }

    pub fn truth(&self) -> Arc<TruthEngine> {
        self.truth.clone()
    }

    pub fn canonical(&self) -> Arc<CanonicalStore> {
        self.canonical.clone()
    }

    pub fn mesh(&self) -> Arc<SemanticMesh> {
        self.mesh.clone()
    }

    pub fn cortex(&self) -> Arc<MetaCortex> {
        self.cortex.clone()
    }

    pub fn optimizer(&self) -> Arc<SelfOptimizer> {
        self.optimizer.clone()
    }

    pub fn domain_engine(&self) -> Arc<DomainEngine> {
        self.domain_engine.clone()
    }

    pub fn enforcer(&self) -> Arc<MemoryEnforcer> {
        self.enforcer.clone()
    }

    pub fn graph(&self) -> Arc<dyn GraphStore> {
        self.graph.clone()
    }

    pub fn optimizer_cycle_hours(&self) -> u64 {
        self.settings.optimizer.optimization_cycle_hours
    }

    /// Arbitrate one chat turn
    ///
    /// Never fails: every layer error becomes a fallback plus a routing
    /// log entry, and the worst case returns the original draft.
    pub async fn handle_chat_turn(&self, request: ChatTurnRequest) -> ChatTurnResponse {
        let mut log = RoutingLog::new();

        // Domain classification
        let started = Instant::now();
        let signal = match self.domain_engine.classify(&request.user_message).await {
            Ok(signal) => signal,
            Err(e) => {
                log.error("domain", &e);
                DomainSignal::unknown(Vec::new())
            },
        };
        log.step(
            "domain",
            started,
            format!("{} ({:.2})", signal.domain, signal.confidence),
        );

        // Retrieval is hinted by the best-ranked domain even when the
        // signal itself stayed below threshold
        let retrieval_domain = if signal.is_unknown() {
            signal.secondary_domains.first().map(|s| s.domain.clone())
        } else {
            Some(signal.domain.clone())
        };

        // Fact and context retrieval in parallel
        let started = Instant::now();
        let (facts_result, chunks_result) = tokio::join!(
            self.retrieve_facts(&request.user_message, retrieval_domain.as_deref()),
            self.mesh.search_context(
                &request.user_message,
                self.settings.mesh.search_top_k,
                self.settings.mesh.search_threshold,
            ),
        );

        let facts = match facts_result {
            Ok(facts) => facts,
            Err(e) => {
                log.error("canonical", &e);
                Vec::new()
            },
        };
        let chunks = match chunks_result {
            Ok(chunks) => chunks,
            Err(e) => {
                log.error("mesh", &e);
                Vec::new()
            },
        };
        log.step(
            "retrieval",
            started,
            format!("{} facts, {} chunks", facts.len(), chunks.len()),
        );

        // Enforcement
        let started = Instant::now();
        let outcome = self
            .enforcer
            .enforce(&request.user_message, &request.assistant_draft, &facts)
            .await;
        for _ in 0..outcome.probe_failures {
            log.error(
                "enforcer",
                &Error::ContradictionCheckFailed("stage B unavailable, stage A used".to_string()),
            );
        }

        let (mut final_reply, mut was_overridden, mut conflict_reason) = match &outcome.decision {
            Decision::Override {
                reply,
                reason,
                grounded_keys,
            } => {
                for (domain, key) in grounded_keys {
                    self.truth.mark_used(domain, key);
                }
                (reply.clone(), true, Some(reason.clone()))
            },
            Decision::TrustLlm => (request.assistant_draft.clone(), false, None),
        };
        log.step(
            "enforcer",
            started,
            if was_overridden { "override" } else { "trust_llm" }.to_string(),
        );

        // Register extracted user assertions as observations
        let started = Instant::now();
        let assertions = extract_assertions(&request.user_message);
        let assertion_count = assertions.len();
        let mut commit_failed = false;
        for assertion in assertions {
            // Accuracy signal: does the assertion confirm standing truth?
            if let Some(existing) = self.truth.get_canonical_truth(&assertion.domain, &assertion.key)
            {
                let correct = existing.value.eq_ignore_ascii_case(&assertion.value);
                self.optimizer
                    .record_metric(MetricKind::Accuracy, if correct { 1.0 } else { 0.0 });
            }

            match self
                .truth
                .register_observation(
                    &assertion.domain,
                    &assertion.key,
                    &assertion.value,
                    ObservationSource::ChatUser,
                    Authority::ShortTerm,
                )
                .await
            {
                Ok(_) => {},
                Err(e @ (Error::SchemaViolation(_) | Error::LimitExceeded(_))) => {
                    log.error("healing", &e);
                },
                Err(e) => {
                    // Commit failure: surface by returning the original
                    // draft
                    log.error("healing", &e);
                    commit_failed = true;
                },
            }
        }
        if assertion_count > 0 {
            log.step("healing", started, format!("{} assertions", assertion_count));
        }

        if commit_failed && was_overridden {
            final_reply = request.assistant_draft.clone();
            was_overridden = false;
            conflict_reason = None;
        }

        // Store the exchange; the chunk stored for this turn was not
        // visible to this turn's retrieval (search ran first)
        let started = Instant::now();
        let mut stored = StoredInfo::default();
        if request.store_interaction {
            match self
                .mesh
                .store_turn(
                    &request.session_id,
                    ChunkRole::User,
                    &request.user_message,
                    HashMap::new(),
                )
                .await
            {
                Ok(chunk) => stored.chunk_id = Some(chunk.id.to_string()),
                Err(e) => log.error("mesh", &e),
            }
            if let Err(e) = self
                .mesh
                .store_turn(
                    &request.session_id,
                    ChunkRole::Assistant,
                    &final_reply,
                    HashMap::new(),
                )
                .await
            {
                log.error("mesh", &e);
            }
            log.step("store", started, "stored turn".to_string());
        }

        // Pattern observation for the cortex
        let started = Instant::now();
        let patterns = Self::question_patterns(&request.user_message);
        if !patterns.is_empty() || !signal.is_unknown() {
            self.cortex.observe(PatternObservation {
                question: request.user_message.clone(),
                domain: signal.domain.clone(),
                score: signal.confidence,
                patterns,
                was_helpful: was_overridden || !facts.is_empty(),
            });
            log.step("cortex", started, "observed".to_string());
        }
        if !signal.is_unknown() {
            self.domain_engine.record_turn(&signal.domain);
        }

        // Turn metrics
        self.optimizer.record_metric(
            MetricKind::OverrideRate,
            if was_overridden { 1.0 } else { 0.0 },
        );
        self.optimizer
            .record_metric(MetricKind::DomainQuality, signal.confidence);
        if !facts.is_empty() || !chunks.is_empty() {
            let useful = was_overridden || !chunks.is_empty();
            self.optimizer
                .record_metric(MetricKind::MemoryHitRate, if useful { 1.0 } else { 0.0 });
        }

        ChatTurnResponse {
            final_reply,
            was_overridden,
            conflict_reason,
            memory_summary: self.mesh.session_summary(&request.session_id),
            memory: MemoryCounts {
                canonical_facts_retrieved: facts.len(),
                context_chunks_retrieved: chunks.len(),
                stored,
            },
            metadata: TurnMetadata {
                timestamp: Utc::now().to_rfc3339(),
                session_id: request.session_id,
                domain: signal.domain,
                domain_confidence: signal.confidence,
            },
            routing_log: log,
        }
    }

    /// Union of vector-similar facts and the hinted domain's facts
    async fn retrieve_facts(&self, query: &str, domain: Option<&str>) -> Result<Vec<Fact>> {
        let mut facts = self
            .canonical
            .query_related(query, self.settings.mesh.search_top_k, domain)
            .await?;

        if let Some(domain) = domain {
            for fact in self.canonical.facts_in_domain(domain, 20) {
                if !facts.iter().any(|f| f.id == fact.id) {
                    facts.push(fact);
                }
            }
        }

        Ok(facts)
    }

    /// One manual optimization cycle: metrics, proposals, evaluation,
    /// sync-point propagation
    pub fn run_optimization_cycle(&self) {
        let hour_ago = Utc::now() - Duration::hours(1);
        self.optimizer.record_metric(
            MetricKind::ConflictRate,
            self.truth.conflicts_since(hour_ago) as f64,
        );

        self.optimizer.run_cycle();
        self.optimizer.evaluate_adjustments(Utc::now());
        self.propagate_params();
    }

    /// Push the current parameter snapshot into the owning layers
    pub fn propagate_params(&self) {
        let params = self.optimizer.params();

        self.truth
            .set_promotion_threshold(params.promotion_threshold.round().max(1.0) as u32);
        self.truth
            .set_decay_threshold_days(params.temporal_decay_days.round().max(1.0) as i64);
        self.enforcer
            .set_default_strictness(params.ame_override_strength);
        self.mesh.set_decay_rate(params.smm_decay_rate);
        self.domain_engine
            .set_confidence_threshold(params.dde_domain_weight);
        for (domain, strictness) in &params.domain_strictness {
            self.enforcer.set_strictness(domain, *strictness);
        }
    }

    /// Daily maintenance: chunk decay, session pruning, fact status decay
    pub async fn run_mesh_maintenance(&self) {
        if let Err(e) = self.mesh.apply_temporal_decay().await {
            tracing::warn!("Mesh decay failed: {}", e);
        }
        if let Err(e) = self.mesh.decay_unused(1).await {
            tracing::warn!("Mesh usage decay failed: {}", e);
        }
        if let Err(e) = self
            .mesh
            .prune_old_conversations(self.settings.mesh.prune_days)
            .await
        {
            tracing::warn!("Mesh prune failed: {}", e);
        }
        self.truth.apply_temporal_decay();
    }

    /// Collapse cortex patterns when the threshold is reached; ground
    /// universal patterns into the graph as a side effect
    pub async fn run_cortex_collapse(&self) {
        if !self.cortex.needs_collapse() {
            return;
        }
        self.cortex.collapse_patterns();
        if let Err(e) = self.cortex.ground_universal(self.graph.as_ref()).await {
            tracing::debug!("Pattern grounding skipped: {}", e);
        }
    }

    /// Persist schema, patterns and optimizer state to the snapshot files
    pub fn persist_state(&self) -> Result<()> {
        let paths = &self.settings.snapshots;
        self.canonical
            .schema()
            .persist(std::path::Path::new(&paths.schema))?;
        self.cortex.persist(std::path::Path::new(&paths.patterns))?;
        self.optimizer
            .persist(std::path::Path::new(&paths.optimizer))?;
        Ok(())
    }

    /// Restore state from the snapshot files, ignoring missing ones
    pub fn restore_state(&self) {
        let paths = &self.settings.snapshots;
        let _ = self.canonical.schema().restore(std::path::Path::new(&paths.schema));
        let _ = self.cortex.restore(std::path::Path::new(&paths.patterns));
        let _ = self.optimizer.restore(std::path::Path::new(&paths.optimizer));
    }

    fn question_patterns(message: &str) -> Vec<String> {
        let lower = message.to_lowercase();
        QUESTION_SHAPES
            .iter()
            .filter(|shape| lower.contains(*shape))
            .map(|shape| shape.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_patterns() {
        let patterns = MemoryRouter::question_patterns("What is my name?");
        assert_eq!(patterns, vec!["what is".to_string()]);

        assert!(MemoryRouter::question_patterns("hello there").is_empty());
    }

    #[tokio::test]
    async fn test_offline_router_builds() {
        let router = MemoryRouter::offline();
        let response = router
            .handle_chat_turn(ChatTurnRequest::new("Hello", "Hi, how can I help?"))
            .await;
        assert_eq!(response.final_reply, "Hi, how can I help?");
        assert!(!response.was_overridden);
    }
}
