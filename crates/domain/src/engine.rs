//! Five-signal domain classifier

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

use mnemo_config::DomainEngineConfig;
use mnemo_core::{DomainSignal, Result, ScoredDomain, TextEmbedder};

use crate::exemplar_cache::ExemplarCache;
use crate::profiles::DomainProfile;

const SEMANTIC_WEIGHT: f64 = 0.40;
const KEYWORD_WEIGHT: f64 = 0.15;
const TRANSITION_WEIGHT: f64 = 0.20;
const PRIOR_WEIGHT: f64 = 0.10;
const ENTROPY_WEIGHT: f64 = 0.15;

/// Dynamic domain engine
pub struct DomainEngine {
    config: RwLock<DomainEngineConfig>,
    embedder: Arc<dyn TextEmbedder>,
    profiles: RwLock<Vec<DomainProfile>>,
    exemplar_cache: ExemplarCache,
    /// (previous domain, next domain) -> count
    transitions: RwLock<HashMap<(String, String), u32>>,
    /// Recent classified domains, oldest first
    recent: RwLock<VecDeque<String>>,
}

impl DomainEngine {
    pub fn new(config: DomainEngineConfig, embedder: Arc<dyn TextEmbedder>) -> Self {
        let exemplar_cache = ExemplarCache::new(config.exemplar_cache_capacity);
        Self {
            config: RwLock::new(config),
            embedder,
            profiles: RwLock::new(DomainProfile::core_profiles()),
            exemplar_cache,
            transitions: RwLock::new(HashMap::new()),
            recent: RwLock::new(VecDeque::new()),
        }
    }

    /// Publish a new confidence threshold (optimizer sync-point)
    pub fn set_confidence_threshold(&self, threshold: f64) {
        self.config.write().confidence_threshold = threshold.clamp(0.0, 1.0);
    }

    /// Register an additional profile (e.g. for a learned dynamic domain)
    pub fn register_profile(&self, profile: DomainProfile) {
        let mut profiles = self.profiles.write();
        profiles.retain(|p| p.name != profile.name);
        profiles.push(profile);
    }

    pub fn known_domains(&self) -> Vec<String> {
        self.profiles.read().iter().map(|p| p.name.clone()).collect()
    }

    /// Classify text into a domain signal
    pub async fn classify(&self, text: &str) -> Result<DomainSignal> {
        let profiles = self.profiles.read().clone();
        if profiles.is_empty() {
            return Ok(DomainSignal::unknown(Vec::new()));
        }

        let text_embedding = self.embedder.embed(text).await?;
        let previous = self.recent.read().back().cloned();
        let entropy = self.token_entropy(text);

        let mut scored = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let semantic = self.semantic_score(profile, &text_embedding).await?;
            let keyword = profile.keyword_score(text);
            let transition = self.transition_score(previous.as_deref(), &profile.name);
            let prior = self.prior_score(&profile.name);

            let score = SEMANTIC_WEIGHT * semantic
                + KEYWORD_WEIGHT * keyword
                + TRANSITION_WEIGHT * transition
                + PRIOR_WEIGHT * prior;

            scored.push(ScoredDomain {
                domain: profile.name.clone(),
                score,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Entropy disambiguates: a token-rich text strengthens the leader
        if let Some(leader) = scored.first_mut() {
            leader.score += ENTROPY_WEIGHT * entropy;
        }

        let top = scored[0].clone();
        let signal = if top.score >= self.config.read().confidence_threshold {
            let secondary = scored[1..].to_vec();
            DomainSignal::new(top.domain, top.score).with_secondary(secondary)
        } else {
            DomainSignal::unknown(scored)
        };

        tracing::debug!(
            domain = %signal.domain,
            confidence = signal.confidence,
            "Classified turn"
        );
        Ok(signal)
    }

    /// Record the settled domain of a turn; feeds transitions and the
    /// rolling prior
    pub fn record_turn(&self, domain: &str) {
        let previous = self.recent.read().back().cloned();
        if let Some(previous) = previous {
            *self
                .transitions
                .write()
                .entry((previous, domain.to_string()))
                .or_insert(0) += 1;
        }

        let mut recent = self.recent.write();
        recent.push_back(domain.to_string());
        while recent.len() > self.config.read().recent_window {
            recent.pop_front();
        }
    }

    /// Cosine of the text against the closest exemplar, floored at 0
    async fn semantic_score(
        &self,
        profile: &DomainProfile,
        text_embedding: &[f32],
    ) -> Result<f64> {
        if profile.exemplars.is_empty() {
            return Ok(0.0);
        }

        let key = ExemplarCache::key_for(&profile.exemplars);
        let embeddings = match self.exemplar_cache.get(key) {
            Some(embeddings) => embeddings,
            None => {
                let embeddings = self.embedder.embed_batch(&profile.exemplars).await?;
                self.exemplar_cache.put(key, embeddings.clone());
                embeddings
            },
        };

        let best = embeddings
            .iter()
            .map(|e| cosine(text_embedding, e))
            .fold(0.0f32, f32::max);
        Ok(best as f64)
    }

    fn transition_score(&self, previous: Option<&str>, candidate: &str) -> f64 {
        let Some(previous) = previous else {
            return 0.0;
        };
        let transitions = self.transitions.read();
        let total: u32 = transitions
            .iter()
            .filter(|((from, _), _)| from == previous)
            .map(|(_, count)| count)
            .sum();
        if total == 0 {
            return 0.0;
        }
        let count = transitions
            .get(&(previous.to_string(), candidate.to_string()))
            .copied()
            .unwrap_or(0);
        count as f64 / total as f64
    }

    fn prior_score(&self, candidate: &str) -> f64 {
        let recent = self.recent.read();
        if recent.is_empty() {
            return 0.0;
        }
        let hits = recent.iter().filter(|d| d.as_str() == candidate).count();
        hits as f64 / recent.len() as f64
    }

    /// Normalized Shannon entropy of the token distribution
    ///
    /// Texts below the configured token minimum contribute 0.
    fn token_entropy(&self, text: &str) -> f64 {
        let tokens: Vec<&str> = text.unicode_words().collect();
        if tokens.len() < self.config.read().min_entropy_tokens {
            return 0.0;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *counts.entry(token).or_insert(0) += 1;
        }

        let total = tokens.len() as f64;
        let entropy: f64 = counts
            .values()
            .map(|&count| {
                let p = count as f64 / total;
                -p * p.log2()
            })
            .sum();

        let max_entropy = (counts.len() as f64).log2();
        if max_entropy == 0.0 {
            0.0
        } else {
            entropy / max_entropy
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_store::SimpleEmbedder;

    fn engine() -> DomainEngine {
        DomainEngine::new(
            DomainEngineConfig::default(),
            Arc::new(SimpleEmbedder::new(256)),
        )
    }

    #[tokio::test]
    async fn test_identity_question_ranks_identity_first() {
        let engine = engine();
        let signal = engine.classify("what is my name").await.unwrap();

        let top = if signal.is_unknown() {
            signal.secondary_domains[0].domain.clone()
        } else {
            signal.domain.clone()
        };
        assert_eq!(top, "identity");
    }

    #[tokio::test]
    async fn test_family_question_ranks_family_first() {
        let engine = engine();
        let signal = engine.classify("who are my children").await.unwrap();

        let top = if signal.is_unknown() {
            signal.secondary_domains[0].domain.clone()
        } else {
            signal.domain.clone()
        };
        assert_eq!(top, "family");
    }

    #[tokio::test]
    async fn test_unknown_signal_has_ranked_candidates() {
        let engine = engine();
        let signal = engine.classify("zzz qqq xyzzy").await.unwrap();

        assert!(signal.is_unknown());
        assert_eq!(signal.secondary_domains.len(), 5);
    }

    #[tokio::test]
    async fn test_prior_boosts_recent_domain() {
        let engine = engine();
        for _ in 0..5 {
            engine.record_turn("family");
        }

        let baseline = DomainEngine::new(
            DomainEngineConfig::default(),
            Arc::new(SimpleEmbedder::new(256)),
        );

        let with_prior = engine.classify("tell me about them").await.unwrap();
        let without_prior = baseline.classify("tell me about them").await.unwrap();

        let score = |signal: &DomainSignal, domain: &str| -> f64 {
            if signal.domain == domain {
                return signal.confidence;
            }
            signal
                .secondary_domains
                .iter()
                .find(|s| s.domain == domain)
                .map(|s| s.score)
                .unwrap_or(0.0)
        };

        assert!(score(&with_prior, "family") > score(&without_prior, "family"));
    }

    #[tokio::test]
    async fn test_transitions_learned() {
        let engine = engine();
        engine.record_turn("identity");
        engine.record_turn("family");
        engine.record_turn("identity");
        engine.record_turn("family");

        // After identity, family has been the observed successor
        assert!(engine.transition_score(Some("identity"), "family") > 0.9);
        assert_eq!(engine.transition_score(Some("family"), "assistant"), 0.0);
    }

    #[tokio::test]
    async fn test_short_text_entropy_is_zero() {
        let engine = engine();
        assert_eq!(engine.token_entropy("short text here"), 0.0);

        let long = "one two three four five six seven eight nine ten eleven twelve";
        assert!(engine.token_entropy(long) > 0.0);
    }

    #[tokio::test]
    async fn test_registered_profile_participates() {
        let engine = engine();
        engine.register_profile(DomainProfile::new(
            "astronomy",
            vec!["the night sky", "telescope observation"],
            vec!["telescope", "galaxy", "nebula"],
        ));

        let signal = engine.classify("my telescope shows the galaxy").await.unwrap();
        let top = if signal.is_unknown() {
            signal.secondary_domains[0].domain.clone()
        } else {
            signal.domain.clone()
        };
        assert_eq!(top, "astronomy");
    }
}
