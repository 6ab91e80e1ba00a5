//! Graph store trait
//!
//! The graph is an external contract: timeouts and connection retries are
//! the implementation's responsibility. Callers receive
//! `Error::GraphUnavailable` on failure and must proceed without it.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Typed relation between two concepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Supports,
    Constrains,
    PartOf,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Supports => "SUPPORTS",
            RelationType::Constrains => "CONSTRAINS",
            RelationType::PartOf => "PART_OF",
        }
    }
}

/// A concept reachable from another concept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedConcept {
    pub name: String,
    pub relation: RelationType,
    pub weight: f32,
}

/// Structured graph query
#[derive(Debug, Clone, Default)]
pub struct GraphQuery {
    /// Restrict to concepts in this domain
    pub domain: Option<String>,
    /// Restrict to edges of this relation type
    pub relation: Option<RelationType>,
    /// Restrict to edges at or above this weight
    pub min_weight: Option<f32>,
}

/// One query result row as flat key/value pairs
pub type GraphRow = HashMap<String, String>;

/// Concept/relation store interface
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// Create or refresh a concept node
    async fn store_concept(&self, name: &str, domain: &str) -> Result<()>;

    /// Create or reweight a typed edge
    async fn link_concepts(
        &self,
        from: &str,
        to: &str,
        relation: RelationType,
        weight: f32,
    ) -> Result<()>;

    /// Concepts reachable from `name` within `max_depth` hops
    async fn find_related(&self, name: &str, max_depth: usize) -> Result<Vec<RelatedConcept>>;

    /// Run a structured query
    async fn run_query(&self, query: &GraphQuery) -> Result<Vec<GraphRow>>;
}
