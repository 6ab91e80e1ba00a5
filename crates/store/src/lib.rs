//! Storage backends: vector collections and embedding clients
//!
//! Features:
//! - Dense vector collections via Qdrant (one for facts, one for chunks)
//! - In-memory vector index for offline operation and tests
//! - HTTP embedding client (Ollama-compatible API)
//! - Deterministic token-hash embedder for offline operation
//! - Bounded content-hash embedding cache with hit/miss statistics
//!
//! All implementations sit behind the `VectorIndex` and `TextEmbedder`
//! traits from `mnemo-core`, so layers never see a concrete backend.

pub mod cache;
pub mod embeddings;
pub mod memory_index;
pub mod vector_store;

pub use cache::{CacheStats, CachedEmbedder};
pub use embeddings::{HttpEmbedder, SimpleEmbedder};
pub use memory_index::InMemoryIndex;
pub use vector_store::{QdrantIndex, QdrantIndexConfig};
