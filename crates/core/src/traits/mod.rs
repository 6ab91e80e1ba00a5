//! Service traits for pluggable backends
//!
//! All external collaborators sit behind these traits so layers can be
//! tested with in-memory or scripted implementations and switched at
//! runtime based on configuration:
//!
//! ```text
//! Language models:
//!   - LanguageModel: chat-style text generation
//!
//! Embeddings:
//!   - TextEmbedder: text -> dense vector
//!
//! Vector search:
//!   - VectorIndex: upsert / search / delete over one collection
//!
//! Graph:
//!   - GraphStore: concepts and weighted typed relations
//! ```

mod embedder;
mod graph;
mod llm;
mod vector;

pub use embedder::TextEmbedder;
pub use graph::{GraphQuery, GraphRow, GraphStore, RelatedConcept, RelationType};
pub use llm::LanguageModel;
pub use vector::{VectorFilter, VectorHit, VectorIndex, VectorPoint};
