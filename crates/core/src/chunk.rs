//! Conversational chunks stored by the semantic mesh

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Who produced a conversational chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRole {
    User,
    Assistant,
}

impl ChunkRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkRole::User => "user",
            ChunkRole::Assistant => "assistant",
        }
    }
}

/// One embedded conversational exchange
///
/// The embedding itself lives in the vector index; the chunk carries the
/// metadata that drives decay and eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub session_id: String,
    pub role: ChunkRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub usage_count: u32,
    /// Relevance multiplier in [0, 1], starts at 1.0 and only decays
    pub relevance_decay: f64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub fn new(session_id: impl Into<String>, role: ChunkRole, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            role,
            text: text.into(),
            timestamp: now,
            last_accessed_at: now,
            usage_count: 0,
            relevance_decay: 1.0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Record a retrieval hit
    pub fn mark_used(&mut self) {
        self.usage_count += 1;
        self.last_accessed_at = Utc::now();
    }

    /// Eviction priority: lowest goes first
    pub fn retention_score(&self) -> f64 {
        self.relevance_decay * self.usage_count as f64
    }

    /// Most recent of creation and last access, used by session pruning
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_accessed_at.max(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_defaults() {
        let chunk = Chunk::new("session-1", ChunkRole::User, "hello there");
        assert_eq!(chunk.relevance_decay, 1.0);
        assert_eq!(chunk.usage_count, 0);
        assert_eq!(chunk.session_id, "session-1");
    }

    #[test]
    fn test_mark_used() {
        let mut chunk = Chunk::new("session-1", ChunkRole::Assistant, "hi");
        chunk.mark_used();
        chunk.mark_used();
        assert_eq!(chunk.usage_count, 2);
    }

    #[test]
    fn test_retention_score() {
        let mut chunk = Chunk::new("s", ChunkRole::User, "text");
        assert_eq!(chunk.retention_score(), 0.0);

        chunk.mark_used();
        chunk.relevance_decay = 0.5;
        assert_eq!(chunk.retention_score(), 0.5);
    }
}
