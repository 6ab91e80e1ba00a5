//! Semantic mesh memory
//!
//! Stores conversational chunks with embeddings and supports semantic
//! retrieval weighted by relevance decay. Chunks age out three ways:
//! daily temporal decay, usage-based decay for rarely-retrieved chunks,
//! and session pruning. On capacity breach the lowest
//! `relevance_decay x usage_count` chunks are evicted first, ties broken
//! by oldest access.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use mnemo_config::MeshConfig;
use mnemo_core::{
    Chunk, ChunkRole, Result, TextEmbedder, VectorFilter, VectorIndex, VectorPoint,
};

/// A context search hit with its combined score
#[derive(Debug, Clone)]
pub struct ContextHit {
    pub chunk: Chunk,
    /// `cos(query, chunk) x relevance_decay`
    pub score: f64,
}

/// Statistics from the last prune pass
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneStats {
    pub pruned_chunks: usize,
    pub decayed_chunks: usize,
    pub evicted_chunks: usize,
}

/// Semantic mesh over one vector collection
pub struct SemanticMesh {
    config: parking_lot::RwLock<MeshConfig>,
    chunks: DashMap<Uuid, Chunk>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn TextEmbedder>,
    /// Date the daily decay last ran; keeps `apply_temporal_decay`
    /// idempotent within one calendar day
    last_decay_date: Mutex<Option<NaiveDate>>,
    last_prune: Mutex<PruneStats>,
}

impl SemanticMesh {
    pub fn new(
        config: MeshConfig,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        Self {
            config: parking_lot::RwLock::new(config),
            chunks: DashMap::new(),
            index,
            embedder,
            last_decay_date: Mutex::new(None),
            last_prune: Mutex::new(PruneStats::default()),
        }
    }

    /// Embed and persist one conversational turn
    pub async fn store_turn(
        &self,
        session_id: &str,
        role: ChunkRole,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Chunk> {
        if self.chunks.len() >= self.config.read().max_chunks {
            self.evict_one().await?;
        }

        let chunk = Chunk::new(session_id, role, text).with_metadata(metadata);
        let embedding = self.embedder.embed(text).await?;

        let point = VectorPoint::new(chunk.id.to_string(), embedding).with_payload(
            [
                ("session_id".to_string(), chunk.session_id.clone()),
                ("role".to_string(), role.as_str().to_string()),
                ("kind".to_string(), "chunk".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        self.index.upsert(vec![point]).await?;

        self.chunks.insert(chunk.id, chunk.clone());
        Ok(chunk)
    }

    /// Semantic search ordered by `cos x relevance_decay`
    ///
    /// Hits have their usage count incremented and access time refreshed.
    pub async fn search_context(
        &self,
        query: &str,
        k: usize,
        threshold: f64,
    ) -> Result<Vec<ContextHit>> {
        let embedding = self.embedder.embed(query).await?;
        let filter = VectorFilter::new().must_equal("kind", "chunk");

        // Over-fetch: decay weighting can reorder raw similarity
        let hits = self.index.search(&embedding, k * 3, Some(filter)).await?;

        let mut scored = Vec::new();
        for hit in hits {
            let Ok(id) = Uuid::parse_str(&hit.id) else {
                continue;
            };
            let Some(chunk) = self.chunks.get(&id).map(|c| c.clone()) else {
                continue;
            };
            let score = hit.score as f64 * chunk.relevance_decay;
            if score >= threshold {
                scored.push(ContextHit { chunk, score });
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        for hit in &mut scored {
            if let Some(mut chunk) = self.chunks.get_mut(&hit.chunk.id) {
                chunk.mark_used();
                hit.chunk = chunk.clone();
            }
        }

        Ok(scored)
    }

    /// Most recent `k` turns of one session, newest last
    pub fn get_session_history(&self, session_id: &str, k: usize) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self
            .chunks
            .iter()
            .filter(|e| e.value().session_id == session_id)
            .map(|e| e.value().clone())
            .collect();
        chunks.sort_by_key(|c| c.timestamp);
        if chunks.len() > k {
            chunks.drain(..chunks.len() - k);
        }
        chunks
    }

    /// Remove sessions idle longer than `days`
    pub async fn prune_old_conversations(&self, days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days);

        // Last activity per session
        let mut last_activity: HashMap<String, chrono::DateTime<Utc>> = HashMap::new();
        for entry in self.chunks.iter() {
            let chunk = entry.value();
            let activity = chunk.last_activity();
            last_activity
                .entry(chunk.session_id.clone())
                .and_modify(|t| *t = (*t).max(activity))
                .or_insert(activity);
        }

        let stale: Vec<String> = last_activity
            .into_iter()
            .filter(|(_, t)| *t < cutoff)
            .map(|(s, _)| s)
            .collect();

        let ids: Vec<Uuid> = self
            .chunks
            .iter()
            .filter(|e| stale.contains(&e.value().session_id))
            .map(|e| *e.key())
            .collect();

        self.remove_chunks(&ids).await?;
        self.last_prune.lock().pruned_chunks = ids.len();

        if !ids.is_empty() {
            tracing::debug!(sessions = stale.len(), chunks = ids.len(), "Pruned stale sessions");
        }
        Ok(ids.len())
    }

    /// Decay chunks retrieved fewer than `usage_threshold` times; drop
    /// those falling below the relevance floor
    pub async fn decay_unused(&self, usage_threshold: u32) -> Result<usize> {
        let mut dropped = Vec::new();
        for mut entry in self.chunks.iter_mut() {
            if entry.usage_count < usage_threshold {
                entry.relevance_decay *= self.config.read().usage_decay_factor;
                if entry.relevance_decay < self.config.read().min_relevance {
                    dropped.push(*entry.key());
                }
            }
        }

        self.remove_chunks(&dropped).await?;
        self.last_prune.lock().decayed_chunks = dropped.len();
        Ok(dropped.len())
    }

    /// Daily relevance decay; a second call on the same calendar day is a
    /// no-op
    pub async fn apply_temporal_decay(&self) -> Result<usize> {
        let today = Utc::now().date_naive();
        {
            let mut last = self.last_decay_date.lock();
            if *last == Some(today) {
                return Ok(0);
            }
            *last = Some(today);
        }

        let mut dropped = Vec::new();
        for mut entry in self.chunks.iter_mut() {
            entry.relevance_decay *= self.config.read().decay_rate;
            if entry.relevance_decay < self.config.read().min_relevance {
                dropped.push(*entry.key());
            }
        }

        let decayed = self.chunks.len();
        self.remove_chunks(&dropped).await?;
        Ok(decayed)
    }

    /// Rule-based session summary: first/last exchanges and chunk count
    pub fn session_summary(&self, session_id: &str) -> String {
        let history = self.get_session_history(session_id, usize::MAX);
        if history.is_empty() {
            return String::new();
        }

        let user_turns = history
            .iter()
            .filter(|c| c.role == ChunkRole::User)
            .count();
        let latest: Vec<&str> = history
            .iter()
            .rev()
            .take(2)
            .map(|c| c.text.as_str())
            .collect();

        format!(
            "{} turns ({} from user); latest: {}",
            history.len(),
            user_turns,
            latest.join(" | ")
        )
    }

    /// Publish a new daily decay rate (optimizer sync-point)
    pub fn set_decay_rate(&self, rate: f64) {
        self.config.write().decay_rate = rate.clamp(0.5, 0.99);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn last_prune_stats(&self) -> PruneStats {
        *self.last_prune.lock()
    }

    /// Evict the least-retained chunk to make room
    async fn evict_one(&self) -> Result<()> {
        let victim = self
            .chunks
            .iter()
            .min_by(|a, b| {
                let score_a = a.value().retention_score();
                let score_b = b.value().retention_score();
                score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // Ties: oldest access goes first
                    .then_with(|| a.value().last_accessed_at.cmp(&b.value().last_accessed_at))
            })
            .map(|e| *e.key());

        if let Some(id) = victim {
            self.remove_chunks(&[id]).await?;
            self.last_prune.lock().evicted_chunks += 1;
        }
        Ok(())
    }

    async fn remove_chunks(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.index.delete(&id_strings).await?;
        for id in ids {
            self.chunks.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_store::{InMemoryIndex, SimpleEmbedder};

    fn mesh() -> SemanticMesh {
        SemanticMesh::new(
            MeshConfig::default(),
            Arc::new(InMemoryIndex::new()),
            Arc::new(SimpleEmbedder::new(128)),
        )
    }

    #[tokio::test]
    async fn test_store_turn_defaults() {
        let mesh = mesh();
        let chunk = mesh
            .store_turn("s1", ChunkRole::User, "I like hiking", HashMap::new())
            .await
            .unwrap();

        assert_eq!(chunk.relevance_decay, 1.0);
        assert_eq!(chunk.usage_count, 0);
        assert_eq!(mesh.chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_search_increments_usage() {
        let mesh = mesh();
        mesh.store_turn("s1", ChunkRole::User, "I like hiking in the mountains", HashMap::new())
            .await
            .unwrap();

        let hits = mesh
            .search_context("hiking mountains", 5, 0.0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.usage_count, 1);

        // A second search sees the refreshed usage count
        let hits = mesh.search_context("hiking mountains", 5, 0.0).await.unwrap();
        assert_eq!(hits[0].chunk.usage_count, 2);
    }

    #[tokio::test]
    async fn test_search_threshold_filters() {
        let mesh = mesh();
        mesh.store_turn("s1", ChunkRole::User, "completely unrelated topic", HashMap::new())
            .await
            .unwrap();

        let hits = mesh
            .search_context("quantum flux capacitor", 5, 0.9)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_session_history_order() {
        let mesh = mesh();
        mesh.store_turn("s1", ChunkRole::User, "first", HashMap::new())
            .await
            .unwrap();
        mesh.store_turn("s1", ChunkRole::Assistant, "second", HashMap::new())
            .await
            .unwrap();
        mesh.store_turn("s2", ChunkRole::User, "other session", HashMap::new())
            .await
            .unwrap();

        let history = mesh.get_session_history("s1", 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "first");
        assert_eq!(history[1].text, "second");
    }

    #[tokio::test]
    async fn test_temporal_decay_idempotent_same_day() {
        let mesh = mesh();
        mesh.store_turn("s1", ChunkRole::User, "hello", HashMap::new())
            .await
            .unwrap();

        mesh.apply_temporal_decay().await.unwrap();
        let after_first = mesh.get_session_history("s1", 1)[0].relevance_decay;
        assert!((after_first - 0.95).abs() < 1e-9);

        // Second run on the same day must not decay again
        mesh.apply_temporal_decay().await.unwrap();
        let after_second = mesh.get_session_history("s1", 1)[0].relevance_decay;
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_decay_unused_drops_below_floor() {
        let mut config = MeshConfig::default();
        config.min_relevance = 0.5;
        let mesh = SemanticMesh::new(
            config,
            Arc::new(InMemoryIndex::new()),
            Arc::new(SimpleEmbedder::new(128)),
        );

        mesh.store_turn("s1", ChunkRole::User, "rarely used", HashMap::new())
            .await
            .unwrap();

        // 1.0 -> 0.8 (kept) -> 0.64 (kept) -> 0.512 (kept) -> 0.4096 (dropped)
        for _ in 0..3 {
            mesh.decay_unused(1).await.unwrap();
        }
        assert_eq!(mesh.chunk_count(), 1);
        mesh.decay_unused(1).await.unwrap();
        assert_eq!(mesh.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_eviction_on_cap() {
        let mut config = MeshConfig::default();
        config.max_chunks = 2;
        let mesh = SemanticMesh::new(
            config,
            Arc::new(InMemoryIndex::new()),
            Arc::new(SimpleEmbedder::new(128)),
        );

        mesh.store_turn("s1", ChunkRole::User, "one", HashMap::new())
            .await
            .unwrap();
        mesh.store_turn("s1", ChunkRole::User, "two", HashMap::new())
            .await
            .unwrap();

        // Retrieval protects "one two" hits; the untouched chunk evicts
        mesh.search_context("one", 1, 0.0).await.unwrap();

        mesh.store_turn("s1", ChunkRole::User, "three", HashMap::new())
            .await
            .unwrap();

        assert_eq!(mesh.chunk_count(), 2);
        let texts: Vec<String> = mesh
            .get_session_history("s1", 10)
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert!(texts.contains(&"one".to_string()));
        assert!(texts.contains(&"three".to_string()));
    }

    #[tokio::test]
    async fn test_prune_recent_sessions_kept() {
        let mesh = mesh();
        mesh.store_turn("s1", ChunkRole::User, "recent activity", HashMap::new())
            .await
            .unwrap();

        let pruned = mesh.prune_old_conversations(30).await.unwrap();
        assert_eq!(pruned, 0);
        assert_eq!(mesh.chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_session_summary() {
        let mesh = mesh();
        assert!(mesh.session_summary("missing").is_empty());

        mesh.store_turn("s1", ChunkRole::User, "I like hiking", HashMap::new())
            .await
            .unwrap();
        mesh.store_turn("s1", ChunkRole::Assistant, "Noted!", HashMap::new())
            .await
            .unwrap();

        let summary = mesh.session_summary("s1");
        assert!(summary.contains("2 turns"));
        assert!(summary.contains("1 from user"));
    }
}
