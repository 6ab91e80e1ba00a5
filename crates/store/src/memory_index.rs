//! In-memory vector index
//!
//! Brute-force cosine search over a guarded map. Used for offline operation
//! and as the test double for the Qdrant index.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use mnemo_core::{Result, VectorFilter, VectorHit, VectorIndex, VectorPoint};

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, String>,
}

/// Brute-force in-memory index
#[derive(Default)]
pub struct InMemoryIndex {
    points: RwLock<HashMap<String, StoredPoint>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
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
        dot / (norm_a * norm_b)
    }

    fn matches(payload: &HashMap<String, String>, filter: &VectorFilter) -> bool {
        filter
            .equals
            .iter()
            .all(|(k, v)| payload.get(k).is_some_and(|p| p == v))
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()> {
        let mut map = self.points.write();
        for point in points {
            map.insert(
                point.id,
                StoredPoint {
                    vector: point.vector,
                    payload: point.payload,
                },
            );
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<VectorFilter>,
    ) -> Result<Vec<VectorHit>> {
        let map = self.points.read();
        let mut hits: Vec<VectorHit> = map
            .iter()
            .filter(|(_, p)| {
                filter
                    .as_ref()
                    .map(|f| Self::matches(&p.payload, f))
                    .unwrap_or(true)
            })
            .map(|(id, p)| VectorHit {
                id: id.clone(),
                score: Self::cosine(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut map = self.points.write();
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.points.read().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, kv: &[(&str, &str)]) -> VectorPoint {
        let payload = kv
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VectorPoint::new(id, vector).with_payload(payload)
    }

    #[tokio::test]
    async fn test_upsert_and_search() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![
                point("a", vec![1.0, 0.0], &[("domain", "identity")]),
                point("b", vec![0.0, 1.0], &[("domain", "family")]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.1], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_filtered_search() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![
                point("a", vec![1.0, 0.0], &[("domain", "identity")]),
                point("b", vec![1.0, 0.0], &[("domain", "family")]),
            ])
            .await
            .unwrap();

        let filter = VectorFilter::new().must_equal("domain", "family");
        let hits = index.search(&[1.0, 0.0], 5, Some(filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![point("a", vec![1.0], &[]), point("b", vec![0.5], &[])])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        index.delete(&["a".to_string()]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }
}
