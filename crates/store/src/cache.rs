//! Bounded embedding cache
//!
//! Keyed by content hash so repeated texts never hit the embedding API
//! twice in one process. The cache never outlives the process: it starts
//! empty and is not persisted.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use mnemo_core::{Result, TextEmbedder};

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

struct CacheInner {
    entries: HashMap<u64, Vec<f32>>,
    // Insertion order for eviction
    order: VecDeque<u64>,
    stats: CacheStats,
}

/// Embedder wrapper with a bounded content-hash cache
pub struct CachedEmbedder {
    inner: Arc<dyn TextEmbedder>,
    capacity: usize,
    cache: Mutex<CacheInner>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn TextEmbedder>, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    fn content_hash(text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.lock().stats
    }

    pub fn len(&self) -> usize {
        self.cache.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TextEmbedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::content_hash(text);

        {
            let mut cache = self.cache.lock();
            if let Some(embedding) = cache.entries.get(&key) {
                let embedding = embedding.clone();
                cache.stats.hits += 1;
                return Ok(embedding);
            }
            cache.stats.misses += 1;
        }

        let embedding = self.inner.embed(text).await?;

        let mut cache = self.cache.lock();
        if !cache.entries.contains_key(&key) {
            while cache.entries.len() >= self.capacity {
                match cache.order.pop_front() {
                    Some(oldest) => {
                        cache.entries.remove(&oldest);
                    },
                    None => break,
                }
            }
            cache.entries.insert(key, embedding.clone());
            cache.order.push_back(key);
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
