//! Cortex state and learning rules

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use mnemo_config::CortexConfig;
use mnemo_core::{Error, GraphStore, RelationType, Result};

use crate::normalize::normalize_pattern;

/// One observed reasoning event
#[derive(Debug, Clone)]
pub struct PatternObservation {
    pub question: String,
    pub domain: String,
    pub score: f64,
    /// Surface patterns active for this question
    pub patterns: Vec<String>,
    pub was_helpful: bool,
}

/// Success statistics for one pattern within one domain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternStats {
    pub successes: u32,
    pub total: u32,
    pub average_score: f64,
}

impl PatternStats {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successes as f64 / self.total as f64
    }

    fn record(&mut self, score: f64, helpful: bool) {
        if helpful {
            self.successes += 1;
        }
        // Running mean over all observations
        self.average_score =
            (self.average_score * self.total as f64 + score) / (self.total as f64 + 1.0);
        self.total += 1;
    }
}

/// A pattern validated in several distinct domains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossDomainPattern {
    /// Normalized form
    pub pattern: String,
    pub domains: Vec<String>,
    pub universal: bool,
    /// Minimum success rate across validating domains
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DomainLearning {
    /// Normalized pattern -> stats
    patterns: HashMap<String, PatternStats>,
    threshold_delta: f64,
    observations: u32,
}

impl DomainLearning {
    fn success_rate(&self) -> f64 {
        let (successes, total) = self
            .patterns
            .values()
            .fold((0u32, 0u32), |(s, t), stats| (s + stats.successes, t + stats.total));
        if total == 0 {
            return 0.0;
        }
        successes as f64 / total as f64
    }
}

/// Serializable cortex state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CortexSnapshot {
    domains: HashMap<String, DomainLearning>,
    cross_domain: HashMap<String, CrossDomainPattern>,
}

/// Meta-learning cortex
pub struct MetaCortex {
    config: CortexConfig,
    state: RwLock<CortexSnapshot>,
    /// Observations since the last collapse pass
    since_collapse: RwLock<usize>,
}

impl MetaCortex {
    pub fn new(config: CortexConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CortexSnapshot::default()),
            since_collapse: RwLock::new(0),
        }
    }

    /// Record one reasoning observation
    pub fn observe(&self, observation: PatternObservation) {
        let mut state = self.state.write();
        let domain = state.domains.entry(observation.domain.clone()).or_default();
        domain.observations += 1;

        for pattern in &observation.patterns {
            let normalized = normalize_pattern(pattern);
            domain
                .patterns
                .entry(normalized)
                .or_default()
                .record(observation.score, observation.was_helpful);
        }

        // Per-domain activation tuning from the overall success rate
        let rate = domain.success_rate();
        domain.threshold_delta = if rate >= 0.8 {
            -1.5
        } else if rate >= 0.6 {
            -0.5
        } else if rate <= 0.3 && domain.observations > 0 {
            1.0
        } else {
            domain.threshold_delta
        };

        for pattern in &observation.patterns {
            let normalized = normalize_pattern(pattern);
            Self::refresh_cross_domain(&mut state, &normalized, self.config.cross_domain_threshold);
        }

        *self.since_collapse.write() += 1;
    }

    /// Threshold adjustment for one domain (negative is easier to
    /// activate)
    pub fn threshold_delta(&self, domain: &str) -> f64 {
        self.state
            .read()
            .domains
            .get(domain)
            .map(|d| d.threshold_delta)
            .unwrap_or(0.0)
    }

    /// Universal patterns discovered so far
    pub fn universal_patterns(&self) -> Vec<CrossDomainPattern> {
        self.state
            .read()
            .cross_domain
            .values()
            .filter(|p| p.universal)
            .cloned()
            .collect()
    }

    /// Relevance bonus for a question in a domain with no local history
    ///
    /// A question containing a universal pattern activates even where the
    /// domain has never seen it.
    pub fn activation_bonus(&self, question: &str, domain: &str) -> f64 {
        let normalized_question = normalize_pattern(question);
        let state = self.state.read();

        let locally_known = state
            .domains
            .get(domain)
            .map(|d| d.observations > 0)
            .unwrap_or(false);
        if locally_known {
            return 0.0;
        }

        let hit = state
            .cross_domain
            .values()
            .any(|p| p.universal && normalized_question.contains(&p.pattern));
        if hit {
            self.config.universal_bonus
        } else {
            0.0
        }
    }

    /// Whether enough observations accumulated to warrant a collapse pass
    pub fn needs_collapse(&self) -> bool {
        *self.since_collapse.read() >= self.config.collapse_threshold
    }

    /// Merge normalized duplicates, keeping the highest-confidence
    /// representative and folding statistics
    pub fn collapse_patterns(&self) -> usize {
        let mut state = self.state.write();
        let mut merged = 0;

        for domain in state.domains.values_mut() {
            let mut folded: HashMap<String, PatternStats> = HashMap::new();
            for (pattern, stats) in domain.patterns.drain() {
                let normalized = normalize_pattern(&pattern);
                match folded.get_mut(&normalized) {
                    Some(existing) => {
                        // Fold counts; keep the stronger average
                        let total = existing.total + stats.total;
                        existing.average_score = if total > 0 {
                            (existing.average_score * existing.total as f64
                                + stats.average_score * stats.total as f64)
                                / total as f64
                        } else {
                            0.0
                        };
                        existing.successes += stats.successes;
                        existing.total = total;
                        merged += 1;
                    },
                    None => {
                        folded.insert(normalized, stats);
                    },
                }
            }
            domain.patterns = folded;
        }

        *self.since_collapse.write() = 0;
        if merged > 0 {
            tracing::debug!(merged, "Collapsed duplicate patterns");
        }
        merged
    }

    /// Materialize universal patterns into the graph store
    ///
    /// Symbolic side effect only; graph failure is swallowed.
    pub async fn ground_universal(&self, graph: &dyn GraphStore) -> Result<usize> {
        let universal = self.universal_patterns();
        let mut grounded = 0;

        for pattern in &universal {
            let node = format!("pattern:{}", pattern.pattern);
            match graph.store_concept(&node, "meta").await {
                Ok(()) => {},
                Err(Error::GraphUnavailable(_)) => return Ok(grounded),
                Err(e) => return Err(e),
            }
            for domain in &pattern.domains {
                let _ = graph.store_concept(domain, "domain").await;
                if graph
                    .link_concepts(&node, domain, RelationType::Supports, pattern.confidence as f32)
                    .await
                    .is_ok()
                {
                    grounded += 1;
                }
            }
        }

        Ok(grounded)
    }

    /// Write state atomically (write-temp-then-rename)
    pub fn persist(&self, path: &Path) -> Result<()> {
        let snapshot = self.state.read().clone();
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
        let snapshot: CortexSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| Error::Persistence(e.to_string()))?;
        *self.state.write() = snapshot;
        Ok(())
    }

    /// Recompute universality for one normalized pattern
    fn refresh_cross_domain(state: &mut CortexSnapshot, normalized: &str, threshold: usize) {
        let mut validating: Vec<(String, f64)> = Vec::new();
        for (domain, learning) in &state.domains {
            if let Some(stats) = learning.patterns.get(normalized) {
                if stats.successes > 0 {
                    validating.push((domain.clone(), stats.success_rate()));
                }
            }
        }

        let distinct: HashSet<&String> = validating.iter().map(|(d, _)| d).collect();
        let universal = distinct.len() >= threshold;
        let confidence = validating
            .iter()
            .map(|(_, rate)| *rate)
            .fold(f64::INFINITY, f64::min);

        if validating.is_empty() {
            return;
        }

        let entry = state
            .cross_domain
            .entry(normalized.to_string())
            .or_insert_with(|| CrossDomainPattern {
                pattern: normalized.to_string(),
                domains: Vec::new(),
                universal: false,
                confidence: 0.0,
            });
        entry.domains = validating.iter().map(|(d, _)| d.clone()).collect();
        entry.confidence = if confidence.is_finite() { confidence } else { 0.0 };
        if universal && !entry.universal {
            tracing::debug!(pattern = %normalized, domains = entry.domains.len(), "Pattern became universal");
        }
        entry.universal = universal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_graph::InMemoryGraph;

    fn cortex() -> MetaCortex {
        MetaCortex::new(CortexConfig::default())
    }

    fn observe(cortex: &MetaCortex, domain: &str, pattern: &str, helpful: bool) {
        cortex.observe(PatternObservation {
            question: format!("question about {}", pattern),
            domain: domain.to_string(),
            score: if helpful { 0.9 } else { 0.2 },
            patterns: vec![pattern.to_string()],
            was_helpful: helpful,
        });
    }

    #[test]
    fn test_threshold_delta_follows_success() {
        let cortex = cortex();
        for _ in 0..10 {
            observe(&cortex, "identity", "compare alternatives", true);
        }
        // 100% success: much easier to activate
        assert_eq!(cortex.threshold_delta("identity"), -1.5);

        for _ in 0..20 {
            observe(&cortex, "family", "compare alternatives", false);
        }
        assert_eq!(cortex.threshold_delta("family"), 1.0);
    }

    #[test]
    fn test_universal_after_three_domains() {
        let cortex = cortex();
        observe(&cortex, "identity", "compare alternatives", true);
        assert!(cortex.universal_patterns().is_empty());

        observe(&cortex, "family", "compare alternatives", true);
        assert!(cortex.universal_patterns().is_empty());

        observe(&cortex, "professional", "compare alternatives", true);
        let universal = cortex.universal_patterns();
        assert_eq!(universal.len(), 1);
        assert_eq!(universal[0].domains.len(), 3);
        // Confidence is the minimum success rate across domains
        assert_eq!(universal[0].confidence, 1.0);
    }

    #[test]
    fn test_confidence_is_min_rate() {
        let cortex = cortex();
        observe(&cortex, "identity", "compare alternatives", true);
        observe(&cortex, "family", "compare alternatives", true);
        observe(&cortex, "professional", "compare alternatives", true);
        // Drag professional's rate down to 0.5
        observe(&cortex, "professional", "compare alternatives", false);

        let universal = cortex.universal_patterns();
        assert_eq!(universal.len(), 1);
        assert!((universal[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_activation_bonus_in_new_domain() {
        let cortex = cortex();
        observe(&cortex, "identity", "compare alternatives", true);
        observe(&cortex, "family", "compare alternatives", true);
        observe(&cortex, "professional", "compare alternatives", true);

        // Never-seen domain with a universal pattern in the question
        let bonus = cortex.activation_bonus("please compare alternatives here", "astronomy");
        assert_eq!(bonus, 2.0);

        // Known domain gets no bonus
        let bonus = cortex.activation_bonus("please compare alternatives here", "identity");
        assert_eq!(bonus, 0.0);

        // Unrelated question gets no bonus
        let bonus = cortex.activation_bonus("what is the weather", "astronomy");
        assert_eq!(bonus, 0.0);
    }

    #[test]
    fn test_collapse_folds_variants() {
        let cortex = cortex();
        // Same pattern in two surface forms lands on one normalized key
        // at observe time; collapse verifies idempotence
        observe(&cortex, "identity", "comparing tradeoffs", true);
        observe(&cortex, "identity", "Compared Tradeoff", true);

        cortex.collapse_patterns();

        let state = cortex.state.read();
        let domain = state.domains.get("identity").unwrap();
        assert_eq!(domain.patterns.len(), 1);
        let stats = domain.patterns.values().next().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successes, 2);
    }

    #[test]
    fn test_needs_collapse_threshold() {
        let mut config = CortexConfig::default();
        config.collapse_threshold = 2;
        let cortex = MetaCortex::new(config);

        assert!(!cortex.needs_collapse());
        observe(&cortex, "identity", "a", true);
        observe(&cortex, "identity", "b", true);
        assert!(cortex.needs_collapse());

        cortex.collapse_patterns();
        assert!(!cortex.needs_collapse());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.json");

        let cortex = cortex();
        observe(&cortex, "identity", "compare alternatives", true);
        observe(&cortex, "family", "compare alternatives", true);
        observe(&cortex, "professional", "compare alternatives", true);
        cortex.persist(&path).unwrap();

        let restored = MetaCortex::new(CortexConfig::default());
        restored.restore(&path).unwrap();
        assert_eq!(restored.universal_patterns().len(), 1);
        assert_eq!(restored.threshold_delta("identity"), -1.5);
    }

    #[tokio::test]
    async fn test_graph_grounding() {
        let cortex = cortex();
        observe(&cortex, "identity", "compare alternatives", true);
        observe(&cortex, "family", "compare alternatives", true);
        observe(&cortex, "professional", "compare alternatives", true);

        let graph = InMemoryGraph::new();
        let grounded = cortex.ground_universal(&graph).await.unwrap();
        assert_eq!(grounded, 3);

        let related = graph
            .find_related("pattern:compare alternativ", 1)
            .await
            .unwrap();
        assert_eq!(related.len(), 3);
    }
}
