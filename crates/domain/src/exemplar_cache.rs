//! LRU cache for exemplar embedding sets
//!
//! Keyed by a hash of the exemplar set itself, not the domain id, so a
//! changed profile never serves stale embeddings. Capacity defaults to 20
//! sets; least-recently-used sets are dropped. The cache dies with the
//! process.

use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

struct CacheInner {
    entries: HashMap<u64, Vec<Vec<f32>>>,
    /// Access order, most recent last
    order: Vec<u64>,
}

/// LRU over embedded exemplar sets
pub struct ExemplarCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl ExemplarCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Cache key for an exemplar set
    pub fn key_for(exemplars: &[String]) -> u64 {
        let mut hasher = DefaultHasher::new();
        for exemplar in exemplars {
            exemplar.hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn get(&self, key: u64) -> Option<Vec<Vec<f32>>> {
        let mut inner = self.inner.lock();
        if let Some(embeddings) = inner.entries.get(&key).cloned() {
            inner.order.retain(|k| *k != key);
            inner.order.push(key);
            Some(embeddings)
        } else {
            None
        }
    }

    pub fn put(&self, key: u64, embeddings: Vec<Vec<f32>>) {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| *k != key);
        } else {
            while inner.entries.len() >= self.capacity {
                if inner.order.is_empty() {
                    break;
                }
                let lru = inner.order.remove(0);
                inner.entries.remove(&lru);
            }
        }
        inner.entries.insert(key, embeddings);
        inner.order.push(key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
