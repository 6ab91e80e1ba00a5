//! Vector index trait
//!
//! One implementation per collection; the fact store and the chunk store
//! each get their own collection with the same embedding dimension.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A point to upsert: id, vector, flat string payload
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, String>,
}

impl VectorPoint {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            payload: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, payload: HashMap<String, String>) -> Self {
        self.payload = payload;
        self
    }
}

/// A search hit with its similarity score
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, String>,
}

/// Payload equality filter; all conditions must match
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub equals: Vec<(String, String)>,
}

impl VectorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must_equal(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }
}

/// Vector collection interface
#[async_trait]
pub trait VectorIndex: Send + Sync + 'static {
    /// Insert or replace points
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()>;

    /// Top-k cosine search, optionally filtered by payload equality
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<VectorFilter>,
    ) -> Result<Vec<VectorHit>>;

    /// Delete points by id
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Number of stored points
    async fn count(&self) -> Result<u64>;
}
