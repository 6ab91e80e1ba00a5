//! Canonical fact store
//!
//! Facts live in a concurrent map keyed by `(domain, key)`; each key holds
//! every fact ever recorded for it (competing and deprecated values are
//! retained for audit). The canonical value is the single ACTIVE/STABLE
//! entry. Every canonical fact is mirrored into the vector index for
//! similarity retrieval.
//!
//! Writers for one key are serialized by the map's per-shard locking plus
//! the healing layer's per-key observation order; readers always see the
//! latest committed state.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use mnemo_config::CanonicalConfig;
use mnemo_core::{
    Authority, Error, Fact, FactStatus, FactType, ObservationSource, Result, TextEmbedder,
    VectorFilter, VectorIndex, VectorPoint,
};

use crate::schema::{AdaptiveSchema, KeyDecision};

/// Inputs for storing a fact
#[derive(Debug, Clone)]
pub struct FactDraft {
    pub domain: String,
    pub key: String,
    pub value: String,
    pub fact_type: FactType,
    pub authority: Authority,
    pub source: ObservationSource,
    /// Free text embedded for similarity retrieval; defaults to
    /// "domain key value" when empty
    pub text: String,
}

impl FactDraft {
    pub fn new(
        domain: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            value: value.into(),
            fact_type: FactType::default(),
            authority: Authority::default(),
            source: ObservationSource::default(),
            text: String::new(),
        }
    }

    pub fn with_fact_type(mut self, fact_type: FactType) -> Self {
        self.fact_type = fact_type;
        self
    }

    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_source(mut self, source: ObservationSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    fn embedding_text(&self) -> String {
        if self.text.is_empty() {
            format!("{} {} {}", self.domain, self.key, self.value)
        } else {
            self.text.clone()
        }
    }
}

/// Canonical fact store with adaptive schema and vector retrieval
pub struct CanonicalStore {
    config: CanonicalConfig,
    schema: Arc<AdaptiveSchema>,
    facts: DashMap<(String, String), Vec<Fact>>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn TextEmbedder>,
}

impl CanonicalStore {
    pub fn new(
        config: CanonicalConfig,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        let schema = Arc::new(AdaptiveSchema::new(config.clone()));
        Self {
            config,
            schema,
            facts: DashMap::new(),
            index,
            embedder,
        }
    }

    pub fn schema(&self) -> Arc<AdaptiveSchema> {
        self.schema.clone()
    }

    /// Direct (legacy) write path: validate, then commit as canonical
    ///
    /// The observation path goes through the healing layer, which calls
    /// `commit_canonical` with the aggregation winner instead.
    pub async fn store_fact(&self, draft: FactDraft) -> Result<Fact> {
        let decision = self.schema.admit(&draft.domain, &draft.key, &draft.value)?;
        let key = match decision {
            KeyDecision::Accepted => draft.key.to_lowercase(),
            KeyDecision::Normalized(known) => known,
        };

        self.check_caps(&draft.domain, &key)?;

        let fact = Fact::new(draft.domain.to_lowercase(), key, draft.value.clone())
            .with_fact_type(draft.fact_type)
            .with_authority(draft.authority)
            .with_source(draft.source);

        self.commit_canonical(fact.clone(), &draft.embedding_text()).await?;
        Ok(fact)
    }

    /// Commit a fact as the canonical value for its key
    ///
    /// Demotes any other ACTIVE/STABLE fact for the same key to DEPRECATED
    /// (single-canonical invariant), appends the new fact, and mirrors it
    /// into the vector index. The in-memory commit happens only after the
    /// index write succeeds, so a failed commit leaves the previous state.
    pub async fn commit_canonical(&self, fact: Fact, embedding_text: &str) -> Result<()> {
        let embedding = self.embed_with_retry(embedding_text).await?;

        let point = VectorPoint::new(fact.id.to_string(), embedding).with_payload(
            [
                ("domain".to_string(), fact.domain.clone()),
                ("key".to_string(), fact.key.clone()),
                ("value".to_string(), fact.value.clone()),
                ("kind".to_string(), "fact".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        self.upsert_with_retry(point).await?;

        let map_key = (fact.domain.clone(), fact.key.clone());
        let mut entry = self.facts.entry(map_key).or_default();
        for existing in entry.iter_mut() {
            if existing.id != fact.id && existing.status.is_canonical() {
                existing.status = FactStatus::Deprecated;
            }
        }
        match entry.iter_mut().find(|f| f.id == fact.id) {
            Some(existing) => *existing = fact,
            None => entry.push(fact),
        }

        Ok(())
    }

    /// Record a non-canonical fact (e.g. a conflict loser kept for audit)
    pub fn record_fact(&self, fact: Fact) {
        let map_key = (fact.domain.clone(), fact.key.clone());
        let mut entry = self.facts.entry(map_key).or_default();
        match entry.iter_mut().find(|f| f.id == fact.id) {
            Some(existing) => *existing = fact,
            None => entry.push(fact),
        }
    }

    /// Current canonical value for `(domain, key)`, refreshing access time
    pub fn get_fact(&self, domain: &str, key: &str) -> Option<Fact> {
        let map_key = (domain.to_lowercase(), key.to_lowercase());
        let mut entry = self.facts.get_mut(&map_key)?;
        let fact = entry.iter_mut().find(|f| f.status.is_canonical())?;
        fact.touch();
        Some(fact.clone())
    }

    /// All facts recorded for a key, including suspect and deprecated
    pub fn facts_for_key(&self, domain: &str, key: &str) -> Vec<Fact> {
        self.facts
            .get(&(domain.to_lowercase(), key.to_lowercase()))
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Canonical facts in one domain, strongest confidence first
    pub fn facts_in_domain(&self, domain: &str, limit: usize) -> Vec<Fact> {
        let domain = domain.to_lowercase();
        let mut facts: Vec<Fact> = self
            .facts
            .iter()
            .filter(|e| e.key().0 == domain)
            .filter_map(|e| e.value().iter().find(|f| f.status.is_canonical()).cloned())
            .collect();
        facts.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        facts.truncate(limit);
        facts
    }

    /// Lookup with precedence: exact match, then fuzzy-normalized key
    /// match, then domain-restricted vector match
    pub async fn lookup(&self, domain: &str, key: &str) -> Option<Fact> {
        if let Some(fact) = self.get_fact(domain, key) {
            return Some(fact);
        }

        // Fuzzy: compare against the keys recorded for this domain
        let domain_lower = domain.to_lowercase();
        let key_lower = key.to_lowercase();
        let best = self
            .facts
            .iter()
            .filter(|e| e.key().0 == domain_lower)
            .map(|e| {
                let known = e.key().1.clone();
                let similarity = crate::schema::normalized_similarity(&key_lower, &known);
                (known, similarity)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((known_key, similarity)) = best {
            if similarity >= self.config.fuzzy_similarity_threshold {
                return self.get_fact(&domain_lower, &known_key);
            }
        }

        // Vector fallback restricted to the domain
        let query = format!("{} {}", domain, key);
        let hits = self.query_related(&query, 1, Some(domain)).await.ok()?;
        hits.into_iter().next()
    }

    /// Top-k canonical facts by vector similarity
    ///
    /// When `domain` is given the search is restricted to it; otherwise
    /// all domains known to the schema are permitted.
    pub async fn query_related(
        &self,
        query_text: &str,
        k: usize,
        domain: Option<&str>,
    ) -> Result<Vec<Fact>> {
        let embedding = self.embed_with_retry(query_text).await?;

        let filter = domain.map(|d| {
            VectorFilter::new()
                .must_equal("kind", "fact")
                .must_equal("domain", d.to_lowercase())
        });

        // Over-fetch: hits may point at deprecated facts
        let hits = self.index.search(&embedding, k * 2, filter).await?;

        let mut facts = Vec::new();
        for hit in hits {
            let (Some(hit_domain), Some(hit_key)) =
                (hit.payload.get("domain"), hit.payload.get("key"))
            else {
                continue;
            };
            if let Some(fact) = self.get_fact(hit_domain, hit_key) {
                if hit.id == fact.id.to_string() && !facts.iter().any(|f: &Fact| f.id == fact.id) {
                    facts.push(fact);
                    if facts.len() == k {
                        break;
                    }
                }
            }
        }
        Ok(facts)
    }

    /// Total facts across all keys (audit copies included)
    pub fn total_facts(&self) -> usize {
        self.facts.iter().map(|e| e.value().len()).sum()
    }

    /// All facts in the store
    pub fn all_facts(&self) -> Vec<Fact> {
        self.facts
            .iter()
            .flat_map(|e| e.value().clone())
            .collect()
    }

    /// Replace a stored fact in place (status/confidence mutations)
    pub fn update_fact(&self, fact: &Fact) {
        let map_key = (fact.domain.clone(), fact.key.clone());
        if let Some(mut entry) = self.facts.get_mut(&map_key) {
            if let Some(existing) = entry.iter_mut().find(|f| f.id == fact.id) {
                *existing = fact.clone();
            }
        }
    }

    /// Remove fully-invalidated deprecated facts (dependents cleared)
    pub async fn purge_deprecated(&self, domain: &str, key: &str) -> Result<usize> {
        let map_key = (domain.to_lowercase(), key.to_lowercase());
        let removed_ids: Vec<String> = match self.facts.get_mut(&map_key) {
            Some(mut entry) => {
                let removed: Vec<String> = entry
                    .iter()
                    .filter(|f| f.status == FactStatus::Deprecated)
                    .map(|f| f.id.to_string())
                    .collect();
                entry.retain(|f| f.status != FactStatus::Deprecated);
                removed
            },
            None => Vec::new(),
        };

        if !removed_ids.is_empty() {
            self.index.delete(&removed_ids).await?;
        }
        Ok(removed_ids.len())
    }

    fn check_caps(&self, domain: &str, key: &str) -> Result<()> {
        let domain = domain.to_lowercase();
        let key = key.to_lowercase();
        if self.facts.contains_key(&(domain.clone(), key)) {
            // Replacing an existing key never breaches a cap
            return Ok(());
        }

        let total: usize = self.facts.len();
        if total >= self.config.max_total_facts {
            return Err(Error::LimitExceeded(format!(
                "total fact cap ({}) reached",
                self.config.max_total_facts
            )));
        }

        let in_domain = self.facts.iter().filter(|e| e.key().0 == domain).count();
        if in_domain >= self.config.max_facts_per_domain {
            return Err(Error::LimitExceeded(format!(
                "per-domain fact cap ({}) reached for '{}'",
                self.config.max_facts_per_domain, domain
            )));
        }

        Ok(())
    }

    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let mut backoff = Duration::from_millis(50);
        let mut last = None;
        for attempt in 0..3 {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            match self.embedder.embed(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e @ Error::BackendUnavailable(_)) => last = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| Error::BackendUnavailable("embedder".into())))
    }

    async fn upsert_with_retry(&self, point: VectorPoint) -> Result<()> {
        let mut backoff = Duration::from_millis(50);
        let mut last = None;
        for attempt in 0..3 {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            match self.index.upsert(vec![point.clone()]).await {
                Ok(()) => return Ok(()),
                Err(e @ Error::BackendUnavailable(_)) => last = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| Error::BackendUnavailable("vector index".into())))
    }
}
