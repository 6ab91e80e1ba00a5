//! Core types and traits for the layered memory system
//!
//! This crate provides the foundational vocabulary shared by every layer:
//! - Entity types (facts, observations, conflicts, conversational chunks)
//! - Domain classification signal types
//! - Error types with per-layer failure kinds
//! - Service traits for pluggable backends (LLM, embedder, vector index,
//!   graph store)
//!
//! Ownership rules live with the layers themselves: the canonical store owns
//! facts, the healing layer owns observations, the mesh owns chunks. This
//! crate only defines their shapes.

pub mod chunk;
pub mod error;
pub mod fact;
pub mod llm_types;
pub mod signal;
pub mod traits;

pub use chunk::{Chunk, ChunkRole};
pub use error::{Error, ErrorKind, Result};
pub use fact::{
    Authority, Conflict, ConflictResolution, Fact, FactStatus, FactType, Observation,
    ObservationSource,
};
pub use llm_types::{GenerateRequest, GenerateResponse, Message, Role};
pub use signal::{DomainSignal, ScoredDomain};
pub use traits::{
    GraphQuery, GraphRow, GraphStore, LanguageModel, RelatedConcept, RelationType, TextEmbedder,
    VectorFilter, VectorHit, VectorIndex, VectorPoint,
};
