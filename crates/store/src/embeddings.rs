//! Embedding clients
//!
//! `HttpEmbedder` talks to an Ollama-compatible embedding API. The
//! `SimpleEmbedder` produces deterministic token-hash vectors so the system
//! can run (and be tested) without an embedding service; texts sharing
//! vocabulary land near each other, which is all retrieval needs offline.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use mnemo_config::EmbeddingConfig;
use mnemo_core::{Error, Result, TextEmbedder};

/// Request to the embedding API
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

/// Response from the embedding API
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP embedding client (Ollama-compatible `/api/embed`)
pub struct HttpEmbedder {
    client: Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl TextEmbedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
        };

        let url = format!("{}/api/embed", self.config.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("embed request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::BackendUnavailable(format!(
                "embed API returned {}",
                status
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("embed response parse: {}", e)))?;

        let embedding = body
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendUnavailable("embed API returned no vectors".into()))?;

        if embedding.len() != self.config.dimension {
            return Err(Error::BackendUnavailable(format!(
                "embedding dimension mismatch: got {}, expected {}",
                embedding.len(),
                self.config.dimension
            )));
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Deterministic token-hash embedder
///
/// Each lowercase word token hashes into a bucket; the vector is the
/// normalized bucket histogram.
pub struct SimpleEmbedder {
    dimension: usize,
}

impl SimpleEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimension;
            embedding[idx] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl TextEmbedder for SimpleEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_embedder_normalized() {
        let embedder = SimpleEmbedder::new(128);
        let embedding = embedder.embed("hello world").await.unwrap();

        assert_eq!(embedding.len(), 128);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_simple_embedder_deterministic() {
        let embedder = SimpleEmbedder::new(128);
        let a = embedder.embed("my name is Morten").await.unwrap();
        let b = embedder.embed("my name is Morten").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let embedder = SimpleEmbedder::new(256);
        let query = embedder.embed("what is my name").await.unwrap();
        let related = embedder.embed("name Morten").await.unwrap();
        let unrelated = embedder.embed("weather forecast tomorrow rain").await.unwrap();

        let cos = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
        };

        assert!(cos(&query, &related) > cos(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text() {
        let embedder = SimpleEmbedder::new(64);
        let embedding = embedder.embed("").await.unwrap();
        assert!(embedding.iter().all(|v| *v == 0.0));
    }
}
