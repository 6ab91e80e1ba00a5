//! Graph memory implementations
//!
//! The graph store is an optional collaborator: callers must tolerate
//! `Error::GraphUnavailable` and proceed without it. Two implementations
//! ship here:
//!
//! - `InMemoryGraph`: adjacency-map graph with bounded-depth traversal,
//!   the default wiring and the test double
//! - `UnavailableGraph`: always fails with `GraphUnavailable`, for
//!   deployments without a graph backend

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};

use mnemo_core::{Error, GraphQuery, GraphRow, GraphStore, RelatedConcept, RelationType, Result};

#[derive(Debug, Clone)]
struct Edge {
    to: String,
    relation: RelationType,
    weight: f32,
}

#[derive(Debug, Default)]
struct GraphInner {
    /// concept name -> domain
    concepts: HashMap<String, String>,
    /// concept name -> outgoing edges
    edges: HashMap<String, Vec<Edge>>,
}

/// Adjacency-map graph store
#[derive(Default)]
pub struct InMemoryGraph {
    inner: RwLock<GraphInner>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn concept_count(&self) -> usize {
        self.inner.read().concepts.len()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn store_concept(&self, name: &str, domain: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.concepts.insert(name.to_string(), domain.to_string());
        inner.edges.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn link_concepts(
        &self,
        from: &str,
        to: &str,
        relation: RelationType,
        weight: f32,
    ) -> Result<()> {
        let mut inner = self.inner.write();

        if !inner.concepts.contains_key(from) {
            return Err(Error::NotFound(format!("concept '{}'", from)));
        }
        if !inner.concepts.contains_key(to) {
            return Err(Error::NotFound(format!("concept '{}'", to)));
        }

        let edges = inner.edges.entry(from.to_string()).or_default();
        // Re-linking replaces the existing edge of the same type
        if let Some(edge) = edges
            .iter_mut()
            .find(|e| e.to == to && e.relation == relation)
        {
            edge.weight = weight;
        } else {
            edges.push(Edge {
                to: to.to_string(),
                relation,
                weight,
            });
        }
        Ok(())
    }

    async fn find_related(&self, name: &str, max_depth: usize) -> Result<Vec<RelatedConcept>> {
        let inner = self.inner.read();

        if !inner.concepts.contains_key(name) {
            return Ok(Vec::new());
        }

        // Breadth-first walk up to max_depth hops
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(name);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        queue.push_back((name, 0));
        let mut related = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            if let Some(edges) = inner.edges.get(current) {
                for edge in edges {
                    if visited.insert(edge.to.as_str()) {
                        related.push(RelatedConcept {
                            name: edge.to.clone(),
                            relation: edge.relation,
                            weight: edge.weight,
                        });
                        queue.push_back((edge.to.as_str(), depth + 1));
                    }
                }
            }
        }

        Ok(related)
    }

    async fn run_query(&self, query: &GraphQuery) -> Result<Vec<GraphRow>> {
        let inner = self.inner.read();
        let mut rows = Vec::new();

        for (from, edges) in &inner.edges {
            if let Some(ref domain) = query.domain {
                if inner.concepts.get(from) != Some(domain) {
                    continue;
                }
            }
            for edge in edges {
                if let Some(relation) = query.relation {
                    if edge.relation != relation {
                        continue;
                    }
                }
                if let Some(min_weight) = query.min_weight {
                    if edge.weight < min_weight {
                        continue;
                    }
                }
                let mut row = GraphRow::new();
                row.insert("from".to_string(), from.clone());
                row.insert("to".to_string(), edge.to.clone());
                row.insert("relation".to_string(), edge.relation.as_str().to_string());
                row.insert("weight".to_string(), edge.weight.to_string());
                rows.push(row);
            }
        }

        Ok(rows)
    }
}

/// Graph store stub that is permanently unreachable
#[derive(Default)]
pub struct UnavailableGraph;

impl UnavailableGraph {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GraphStore for UnavailableGraph {
    async fn store_concept(&self, _name: &str, _domain: &str) -> Result<()> {
        Err(Error::GraphUnavailable("no graph backend configured".into()))
    }

    async fn link_concepts(
        &self,
        _from: &str,
        _to: &str,
        _relation: RelationType,
        _weight: f32,
    ) -> Result<()> {
        Err(Error::GraphUnavailable("no graph backend configured".into()))
    }

    async fn find_related(&self, _name: &str, _max_depth: usize) -> Result<Vec<RelatedConcept>> {
        Err(Error::GraphUnavailable("no graph backend configured".into()))
    }

    async fn run_query(&self, _query: &GraphQuery) -> Result<Vec<GraphRow>> {
        Err(Error::GraphUnavailable("no graph backend configured".into()))
    }
}
